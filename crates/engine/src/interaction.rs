use std::collections::VecDeque;
use tally_core::{InteractionPort, PairPrompt, PromptKind};

/// Replays canned operator answers. Input runs dry as `None`, exactly like a
/// closed terminal.
#[derive(Debug, Default)]
pub struct ScriptedPort {
    inputs: VecDeque<String>,
    pairs: VecDeque<Option<(String, String)>>,
    messages: Vec<String>,
    prompts: Vec<PairPrompt>,
}

impl ScriptedPort {
    pub fn new<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Queues the answer to the next pair prompt. `None` skips it.
    pub fn answer_pair(mut self, pair: Option<(&str, &str)>) -> Self {
        self.pairs
            .push_back(pair.map(|(k, v)| (k.to_string(), v.to_string())));
        self
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn prompts(&self) -> &[PairPrompt] {
        &self.prompts
    }

    pub fn prompts_of(&self, kind: PromptKind) -> usize {
        self.prompts.iter().filter(|p| p.kind == kind).count()
    }

    pub fn remaining_inputs(&self) -> usize {
        self.inputs.len()
    }
}

impl InteractionPort for ScriptedPort {
    fn show_message(&mut self, text: &str) {
        self.messages.push(text.to_string());
    }

    fn get_input(&mut self) -> Option<String> {
        self.inputs.pop_front()
    }

    fn prompt_for_pair(&mut self, prompt: &PairPrompt) -> Option<(String, String)> {
        self.prompts.push(prompt.clone());
        self.pairs.pop_front().flatten()
    }
}
