//! Model, endpoint, and environment constants.

pub mod models {
    pub mod google {
        pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

        pub const GEMINI_2_5_FLASH: &str = "gemini-2.5-flash";
        pub const GEMINI_2_5_FLASH_LITE: &str = "gemini-2.5-flash-lite";
        pub const GEMINI_2_5_PRO: &str = "gemini-2.5-pro";
    }
}

pub mod urls {
    pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
}

pub mod env {
    /// Primary API-key variable, with a Google-convention fallback.
    pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";
    pub const GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";
}

pub mod files {
    /// Default config file name looked up in the working directory.
    pub const CONFIG_FILE: &str = "genchat.toml";
}
