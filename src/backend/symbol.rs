// SPDX-License-Identifier: Apache-2.0

//! SMT-LIB symbol spelling shared by the engines.

use crate::smt_bv_error::SmtBvError;

/// True when `name` is a simple symbol: it cannot be mistaken for a numeral
/// and needs no `|…|` quoting.
pub(crate) fn is_simple_symbol(name: &str) -> bool {
    const EXTRA: &str = "~!@$%^&*_-+=<>.?/";
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || EXTRA.contains(c) => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || EXTRA.contains(c))
}

pub(crate) fn quote_symbol(name: &str) -> String {
    if is_simple_symbol(name) {
        name.to_string()
    } else {
        format!("|{}|", name)
    }
}

/// Rejects names that no quoted symbol can spell.
pub(crate) fn check_symbol(name: &str) -> Result<(), SmtBvError> {
    if name.contains('|') || name.contains('\\') {
        return Err(SmtBvError(format!(
            "symbol {:?} cannot be written in SMT-LIB",
            name
        )));
    }
    Ok(())
}
