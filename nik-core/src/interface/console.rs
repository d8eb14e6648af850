//! Line-oriented console front end.

use std::io::{BufRead, Write};

use tracing::warn;

use super::{InputInterface, OutputInterface};
use crate::ipc::events::Speaker;
use crate::utterance::{Reply, Utterance};

/// Reads one utterance per line. Text is lower-cased; end of input yields the
/// exit sentinel.
pub struct ConsoleInput<R, W> {
    reader: R,
    prompt: W,
}

impl<R: BufRead + Send, W: Write + Send> ConsoleInput<R, W> {
    pub fn new(reader: R, prompt: W) -> Self {
        Self { reader, prompt }
    }
}

impl ConsoleInput<std::io::BufReader<std::io::Stdin>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(std::io::BufReader::new(std::io::stdin()), std::io::stdout())
    }
}

impl<R: BufRead + Send, W: Write + Send> InputInterface for ConsoleInput<R, W> {
    fn get_input(&mut self) -> Utterance {
        loop {
            let _ = write!(self.prompt, "{}: ", Speaker::User.label());
            let _ = self.prompt.flush();

            let mut line = String::new();
            match self.reader.read_line(&mut line) {
                Ok(0) => return Utterance::exit_sentinel(),
                Ok(_) => {
                    let text = line.trim();
                    if text.is_empty() {
                        continue;
                    }
                    return Utterance::text(text.to_lowercase());
                }
                Err(e) => {
                    warn!(error = %e, "console read failed");
                    return Utterance::exit_sentinel();
                }
            }
        }
    }
}

/// Prints `Nik: <reply>` per reply.
pub struct ConsoleOutput<W> {
    writer: W,
}

impl<W: Write + Send> ConsoleOutput<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl ConsoleOutput<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> OutputInterface for ConsoleOutput<W> {
    fn output(&mut self, reply: &Reply) {
        if let Err(e) = writeln!(self.writer, "{}: {}", Speaker::Assistant.label(), reply.text) {
            warn!(error = %e, "console write failed");
        }
        let _ = self.writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn console_input_lowercases_skips_blanks_and_ends_with_sentinel() {
        let mut input = ConsoleInput::new(Cursor::new("\n  Hello There \nBYE\n"), Vec::new());
        assert_eq!(input.get_input(), Utterance::text("hello there"));
        assert_eq!(input.get_input(), Utterance::text("bye"));
        assert!(input.get_input().is_sentinel());
        let prompts = String::from_utf8(input.prompt).expect("utf8 prompt");
        assert!(prompts.starts_with("You: "));
    }

    #[test]
    fn console_output_prefixes_assistant_label() {
        let mut output = ConsoleOutput::new(Vec::new());
        output.output(&Reply::new("Hi there!"));
        let written = String::from_utf8(output.into_inner()).expect("utf8 output");
        assert_eq!(written, "Nik: Hi there!\n");
    }
}
