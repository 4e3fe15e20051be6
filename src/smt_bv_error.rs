// SPDX-License-Identifier: Apache-2.0

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtBvError(pub String);

impl std::fmt::Display for SmtBvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "smt-bv error: {}", self.0)
    }
}

impl std::error::Error for SmtBvError {}

impl From<std::io::Error> for SmtBvError {
    fn from(e: std::io::Error) -> Self {
        SmtBvError(format!("solver i/o failure: {}", e))
    }
}
