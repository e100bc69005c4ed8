//! Command-line interface and REPL
//!
//! The REPL drives its own compare tab, so changes made here show up in
//! the API tab through durable storage like they would in a second
//! browser tab.

use anyhow::Result;
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::compare::{BarView, CompareStore};

const PROMPT: &str = "compare> ";

/// A parsed REPL line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Add(String),
    Remove(String),
    Toggle(String),
    Clear,
    List,
    Url,
    Help,
    Exit,
}

impl ReplCommand {
    /// Parse one input line; `Ok(None)` for blank input
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut parts = line.split_whitespace();
        let Some(verb) = parts.next() else {
            return Ok(None);
        };
        let arg = parts.next();

        if parts.next().is_some() {
            return Err(format!("Too many arguments for '{}'", verb));
        }

        let with_id = |make: fn(String) -> ReplCommand| match arg {
            Some(id) => Ok(Some(make(id.to_string()))),
            None => Err(format!("Usage: {} <device-id>", verb)),
        };

        match verb.to_ascii_lowercase().as_str() {
            "add" | "a" => with_id(ReplCommand::Add),
            "remove" | "rm" => with_id(ReplCommand::Remove),
            "toggle" | "t" => with_id(ReplCommand::Toggle),
            "clear" => Ok(Some(ReplCommand::Clear)),
            "list" | "ls" => Ok(Some(ReplCommand::List)),
            "url" => Ok(Some(ReplCommand::Url)),
            "help" | "?" => Ok(Some(ReplCommand::Help)),
            "exit" | "quit" => Ok(Some(ReplCommand::Exit)),
            other => Err(format!("Unknown command: '{}' (try 'help')", other)),
        }
    }
}

/// Run the interactive REPL until `exit` or end of input
///
/// Blocking; run it on a blocking thread.
pub fn run_repl(store: CompareStore) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    println!("{}", "Compare list REPL. Type 'help' for commands.".cyan());
    print_selection(&store);

    loop {
        let line = match rl.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        let command = match ReplCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(msg) => {
                println!("{}", msg.red());
                continue;
            }
        };
        let _ = rl.add_history_entry(line.as_str());

        match command {
            ReplCommand::Add(id) => {
                store.add(&id);
                print_selection(&store);
            }
            ReplCommand::Remove(id) => {
                store.remove(&id);
                print_selection(&store);
            }
            ReplCommand::Toggle(id) => {
                if store.toggle(&id) {
                    println!("{} {}", "+".green().bold(), id);
                } else {
                    println!("{} {}", "-".red().bold(), id);
                }
                print_selection(&store);
            }
            ReplCommand::Clear => {
                store.clear();
                print_selection(&store);
            }
            ReplCommand::List => print_selection(&store),
            ReplCommand::Url => println!("{}", store.compare_href().bright_white()),
            ReplCommand::Help => print_help(),
            ReplCommand::Exit => break,
        }
    }

    Ok(())
}

/// Print the selection the way the compare bar shows it
pub fn print_selection(store: &CompareStore) {
    let ids = store.selection();
    match BarView::for_ids(&ids) {
        None => println!("{}", "No devices selected".dimmed()),
        Some(view) => {
            println!("{}", view.label.bold());
            for (i, id) in ids.iter().enumerate() {
                println!("  {}. {}", i + 1, id.yellow());
            }
            println!("  {}", view.href.cyan());
        }
    }
}

fn print_help() {
    println!("\n{}", "Commands:".bold());
    println!("  {}  add a device", "add <id>".yellow());
    println!("  {}  remove a device", "remove <id>".yellow());
    println!("  {}  toggle a device", "toggle <id>".yellow());
    println!("  {}  clear the selection", "clear".yellow());
    println!("  {}  show the selection", "list".yellow());
    println!("  {}  show the compare link", "url".yellow());
    println!("  {}  leave the REPL\n", "exit".yellow());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            ReplCommand::parse("add deck-1"),
            Ok(Some(ReplCommand::Add("deck-1".to_string())))
        );
        assert_eq!(
            ReplCommand::parse("  RM ally-2 "),
            Ok(Some(ReplCommand::Remove("ally-2".to_string())))
        );
        assert_eq!(
            ReplCommand::parse("t deck-1"),
            Ok(Some(ReplCommand::Toggle("deck-1".to_string())))
        );
        assert_eq!(ReplCommand::parse("ls"), Ok(Some(ReplCommand::List)));
        assert_eq!(ReplCommand::parse("quit"), Ok(Some(ReplCommand::Exit)));
    }

    #[test]
    fn test_parse_blank_line() {
        assert_eq!(ReplCommand::parse(""), Ok(None));
        assert_eq!(ReplCommand::parse("   "), Ok(None));
    }

    #[test]
    fn test_parse_errors() {
        assert!(ReplCommand::parse("add").unwrap_err().contains("Usage"));
        assert!(ReplCommand::parse("add a b").is_err());
        assert!(ReplCommand::parse("frobnicate").unwrap_err().contains("Unknown"));
    }
}
