use std::io::{self, BufRead, Write};
use tally_core::{InteractionPort, PairPrompt, PromptKind};

/// Terminal prompts on a line-oriented reader and writer.
pub struct ConsolePort<R, W> {
    input: R,
    output: W,
}

impl ConsolePort<io::BufReader<io::Stdin>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsolePort<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn ask(&mut self, question: &str) -> Option<String> {
        self.show_message(question);
        let answer = self.get_input()?;
        let answer = answer.trim();
        (!answer.is_empty()).then(|| answer.to_string())
    }
}

impl<R: BufRead, W: Write> InteractionPort for ConsolePort<R, W> {
    fn show_message(&mut self, text: &str) {
        if let Err(e) = writeln!(self.output, "{text}") {
            tracing::warn!(error = %e, "failed to write to console");
        }
    }

    fn get_input(&mut self) -> Option<String> {
        let _ = write!(self.output, "> ");
        let _ = self.output.flush();

        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read console input");
                None
            }
        }
    }

    fn prompt_for_pair(&mut self, prompt: &PairPrompt) -> Option<(String, String)> {
        match prompt.kind {
            PromptKind::Vendor => {
                self.show_message(&format!(
                    "\nUnknown vendor: {}  ({}, {})",
                    prompt.subject, prompt.date, prompt.amount
                ));
                let pattern = self.ask("Text to match in future descriptions (blank to skip):")?;
                let vendor = self.ask("Vendor name (blank to skip):")?;
                Some((pattern, vendor))
            }
            PromptKind::Category => {
                self.show_message(&format!(
                    "\nNo category for vendor: {}  ({}, {})",
                    prompt.subject, prompt.date, prompt.amount
                ));
                let category = self.ask("Category (blank to skip):")?;
                Some((prompt.subject.clone(), category))
            }
        }
    }
}
