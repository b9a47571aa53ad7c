use crate::registry::Invocation;
use crate::InterpreterError;

/// What the interpreter made of a line of user input.
#[derive(Debug, Clone, PartialEq)]
pub enum Interpretation {
    /// A structured command call.
    Invocation(Invocation),
    /// A conversational reply (clarifying question, refusal, chit-chat).
    PlainText(String),
}

/// Maps free text onto the advertised command catalog.
pub trait InterpreterClient {
    fn interpret(&mut self, text: &str) -> Result<Interpretation, InterpreterError>;
}
