//! Where PRN and PRA send their values.

use std::io::Write;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Output {
    /// PRN: a register value as a decimal number.
    Number(u8),
    /// PRA: a register value as an ASCII character.
    Char(u8),
}

pub trait OutputSink {
    fn emit(&mut self, output: Output);
}

/// Prints to standard output, one number per line.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn emit(&mut self, output: Output) {
        match output {
            Output::Number(value) => println!("{}", value),
            Output::Char(value) => {
                print!("{}", value as char);
                if let Err(err) = std::io::stdout().flush() {
                    log::warn!("failed to flush stdout: {}", err);
                }
            }
        }
    }
}

/// Keeps everything emitted, in order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecordingSink {
    outputs: Vec<Output>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    /// Values emitted by PRN only.
    pub fn numbers(&self) -> Vec<u8> {
        self.outputs
            .iter()
            .filter_map(|output| match output {
                Output::Number(value) => Some(*value),
                Output::Char(_) => None,
            })
            .collect()
    }

    /// Everything rendered as text, the way [`StdoutSink`] would print it.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for output in &self.outputs {
            match output {
                Output::Number(value) => {
                    text.push_str(&value.to_string());
                    text.push('\n');
                }
                Output::Char(value) => text.push(*value as char),
            }
        }
        text
    }

    pub fn clear(&mut self) {
        self.outputs.clear();
    }
}

impl OutputSink for RecordingSink {
    fn emit(&mut self, output: Output) {
        self.outputs.push(output);
    }
}
