//! Line-oriented command input for the interactive `watch` session.
//!
//! Stdin is read on its own thread and parsed commands are sent over a
//! channel, so the main loop never blocks on the terminal.

use std::{
    io::{BufRead, Write},
    sync::mpsc::Sender,
    thread::JoinHandle,
};

pub const HELP: &str =
    "Commands: s, search [query]  search the index | q, quit  stop monitoring";

pub const QUERY_PROMPT: &str = "Enter search query: ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Search(String),
    Quit,
    Help,
}

/// Result of feeding one line to a [`Console`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Command(ConsoleCommand),
    /// A bare `search` was entered; the next line is the query.
    PromptQuery,
    Nothing,
}

/// Parser state: either reading a command or waiting for a query.
#[derive(Debug, Default)]
pub struct Console {
    awaiting_query: bool,
}

impl Console {
    pub fn feed(&mut self, line: &str) -> Step {
        let line = line.trim();

        if std::mem::take(&mut self.awaiting_query) {
            return if line.is_empty() {
                Step::Nothing
            } else {
                Step::Command(ConsoleCommand::Search(line.to_string()))
            };
        }

        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match word.to_ascii_lowercase().as_str() {
            "" => Step::Nothing,
            "s" | "search" if rest.is_empty() => {
                self.awaiting_query = true;
                Step::PromptQuery
            }
            "s" | "search" => {
                Step::Command(ConsoleCommand::Search(rest.to_string()))
            }
            "q" | "quit" | "exit" => Step::Command(ConsoleCommand::Quit),
            _ => Step::Command(ConsoleCommand::Help),
        }
    }
}

/// Read commands from `input` on a new thread until end of input.
///
/// End of input and read errors are sent as [`ConsoleCommand::Quit`].
/// The thread also stops once the receiving side hangs up.
pub fn spawn_input<R>(
    input: R,
    commands: Sender<ConsoleCommand>,
) -> std::io::Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    std::thread::Builder::new()
        .name("docwatch-console".to_string())
        .spawn(move || read_commands(input, &commands))
}

fn read_commands<R: BufRead>(input: R, commands: &Sender<ConsoleCommand>) {
    let mut console = Console::default();
    for line in input.lines() {
        let Ok(line) = line else {
            break;
        };
        match console.feed(&line) {
            Step::Command(command) => {
                let quit = command == ConsoleCommand::Quit;
                if commands.send(command).is_err() || quit {
                    return;
                }
            }
            Step::PromptQuery => {
                print!("{QUERY_PROMPT}");
                let _ = std::io::stdout().flush();
            }
            Step::Nothing => {}
        }
    }
    let _ = commands.send(ConsoleCommand::Quit);
}

#[cfg(test)]
mod tests {
    use std::{io::Cursor, sync::mpsc};

    use super::*;

    fn search(q: &str) -> Step {
        Step::Command(ConsoleCommand::Search(q.to_string()))
    }

    #[test]
    fn search_with_inline_query() {
        let mut console = Console::default();
        assert_eq!(console.feed("s invoice 2024"), search("invoice 2024"));
        assert_eq!(console.feed("  SEARCH  notes  "), search("notes"));
    }

    #[test]
    fn bare_search_prompts_for_query() {
        let mut console = Console::default();
        assert_eq!(console.feed("s"), Step::PromptQuery);
        assert_eq!(console.feed("quit"), search("quit"));
        assert_eq!(console.feed("quit"), Step::Command(ConsoleCommand::Quit));
    }

    #[test]
    fn empty_query_cancels_prompt() {
        let mut console = Console::default();
        assert_eq!(console.feed("search"), Step::PromptQuery);
        assert_eq!(console.feed("   "), Step::Nothing);
        assert_eq!(console.feed("q"), Step::Command(ConsoleCommand::Quit));
    }

    #[test]
    fn unknown_input_asks_for_help() {
        let mut console = Console::default();
        assert_eq!(console.feed("frobnicate"), Step::Command(ConsoleCommand::Help));
        assert_eq!(console.feed(""), Step::Nothing);
    }

    #[test]
    fn input_thread_forwards_commands() {
        let (tx, rx) = mpsc::channel();
        let input = Cursor::new("s budget\nhelp\nq\ns ignored\n");
        spawn_input(input, tx).unwrap().join().unwrap();

        let received: Vec<_> = rx.iter().collect();
        assert_eq!(
            received,
            vec![
                ConsoleCommand::Search("budget".into()),
                ConsoleCommand::Help,
                ConsoleCommand::Quit,
            ]
        );
    }

    #[test]
    fn end_of_input_quits() {
        let (tx, rx) = mpsc::channel();
        spawn_input(Cursor::new("s x\n"), tx).unwrap().join().unwrap();

        let received: Vec<_> = rx.iter().collect();
        assert_eq!(
            received,
            vec![ConsoleCommand::Search("x".into()), ConsoleCommand::Quit]
        );
    }
}
