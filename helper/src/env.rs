#[macro_export]
macro_rules! env_var {
    ($name:ident) => {
        const $name: &'static str = stringify!($name);
    };
}

/// Load an env var into a validated newtype, failing with context naming
/// the offending variable.
#[macro_export]
macro_rules! env_load {
    ($type:ident, $name:ident) => {
        $type::try_new(
            std::env::var($name)
                .with_context(|| format!("Missing {} env var", $name))?,
        )
        .with_context(|| format!("{} was not formatted right", $name))?
    };
    ($type:ident, $name:ident, $type_raw:ident) => {
        $type::try_new(
            std::env::var($name)
                .with_context(|| format!("Missing {} env var", $name))?
                .parse::<$type_raw>()
                .with_context(|| {
                    format!(
                        "{} env var cannot be parsed in the correct type",
                        $name
                    )
                })?,
        )
        .with_context(|| format!("{} was not formatted right", $name))?
    };
}

/// Same as [`env_load!`] but falls back to a default when the variable is
/// absent (an empty variable still fails validation).
#[macro_export]
macro_rules! env_load_or {
    ($type:ident, $name:ident, $default:expr) => {
        $type::try_new(
            std::env::var($name).unwrap_or_else(|_| $default.to_string()),
        )
        .with_context(|| format!("{} was not formatted right", $name))?
    };
}
