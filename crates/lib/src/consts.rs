/// Application name, used for state directories and environment prefixes.
pub const APP_NAME: &str = "kiln";

/// Settings file at the build root.
pub const SETTINGS_FILENAME: &str = "kiln.lua";

/// Definition file of an included build.
pub const INCLUDE_FILENAME: &str = "include.lua";

/// Definition file of a module.
pub const MODULE_FILENAME: &str = "module.lua";

/// Per-root state directory (lock file lives here).
pub const STATE_DIR: &str = ".kiln";

/// Prefix of generation staging directories inside a target directory.
pub const STAGING_PREFIX: &str = ".kiln-staging-";

/// Suffix of per-generator stamp files inside a target directory.
pub const STAMP_SUFFIX: &str = ".kiln-stamp";

/// Default directory (relative to the module) for generated artifacts.
pub const DEFAULT_GENERATED_DIR: &str = "libs";

/// Default source directory (relative to the module).
pub const DEFAULT_SOURCES_DIR: &str = "src";

/// Environment variable overriding the default parallelism.
pub const JOBS_ENV: &str = "KILN_JOBS";
