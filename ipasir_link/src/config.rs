/*!
Configuration of a binding.

A binding is configured once, when an [Ipasir](crate::ipasir::Ipasir) instance is created, and the configuration is fixed from then on.
*/

/// The prefix shared by all IPASIR symbols.
pub const IPASIR_PREFIX: &str = "ipasir_";

/// The primary configuration structure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Prepended to each of the nine function names when looking up a symbol.
    ///
    /// Some libraries export the IPASIR functions under a different prefix, alongside (or instead of) the standard one.
    /// The signatures of the functions are the same regardless.
    pub symbol_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            symbol_prefix: IPASIR_PREFIX.to_string(),
        }
    }
}

impl Config {
    /// The full symbol name of an IPASIR function, e.g. `ipasir_add` for `add`.
    pub fn symbol_name(&self, function: &str) -> String {
        format!("{}{function}", self.symbol_prefix)
    }
}
