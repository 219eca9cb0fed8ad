// Stepping policy settings
//
// Read-only from the core's perspective; the hosting application builds
// one of these from its own preference store and hands it to the session.

/// Stepping policy supplied at session construction.
#[derive(Debug, Clone)]
pub struct CoreSettings {
    /// Class patterns single-stepping must not land in, passed to the VM
    /// as class-exclusion filters on every step request. Patterns use the
    /// protocol's wildcard form, e.g. "java.*" or "*.internal".
    pub stepping_excludes: Vec<String>,

    /// Skip over compiler-generated methods while stepping instead of
    /// stopping in them.
    pub skip_synthetics: bool,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            stepping_excludes: Vec::new(),
            skip_synthetics: true,
        }
    }
}

impl CoreSettings {
    /// The exclusion set most front-ends start from: JDK internals.
    pub fn with_jdk_excludes() -> Self {
        Self {
            stepping_excludes: vec![
                "java.*".to_string(),
                "javax.*".to_string(),
                "sun.*".to_string(),
                "com.sun.*".to_string(),
                "jdk.*".to_string(),
            ],
            ..Self::default()
        }
    }
}
