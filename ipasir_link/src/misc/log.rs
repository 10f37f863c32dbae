/*!
Miscelanous items related to [logging](log).

Calls to the log macro are made throughout the library, at points where control crosses the native boundary.

Note, no log implementation is provided.
For more details, see [log].
*/

/// Targets to be used within a [log]! macro.
pub mod targets {
    /// Logs related to [symbol resolution](crate::symbols)
    pub const SYMBOLS: &str = "symbols";

    /// Logs related to the [callback bridge](crate::callbacks)
    pub const CALLBACKS: &str = "callbacks";

    /// Logs related to the [data registry](crate::registry)
    pub const REGISTRY: &str = "registry";

    /// Logs related to [solver handles](crate::solver)
    pub const SOLVER: &str = "solver";
}
