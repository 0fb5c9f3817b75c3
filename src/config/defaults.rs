//! Default values for configuration fields.
//!
//! Used by the resolved root [`Config`](super::Config) and by the CLI.

// ============================================================================
// Site Variables
// ============================================================================

pub fn paginate() -> i64 {
    5
}

pub fn shortdate() -> String {
    "%Y-%m-%d".into()
}

pub fn mediumdate() -> String {
    "%-d-%b-%Y".into()
}

pub fn longdate() -> String {
    "%a %b %-d, %Y".into()
}

pub fn exclude() -> crate::utils::pattern::Patterns {
    crate::utils::pattern::Patterns::parse_with_hidden_guard("").unwrap_or_default()
}

// ============================================================================
// Directory Layout
// ============================================================================

pub mod dirs {
    pub const CONTENT: &str = "content";
    pub const TEMPLATE: &str = "template";
    pub const BUILD: &str = "build";
    pub const INDEXES: &str = "indexes";
    pub const INIT: &str = "init";
}

// ============================================================================
// Serve Defaults
// ============================================================================

pub mod serve {
    pub fn http_port() -> u16 {
        1212
    }

    pub fn lr_port() -> u16 {
        35729
    }
}
