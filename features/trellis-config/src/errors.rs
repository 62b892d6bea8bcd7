/// Errors raised by [`Settings`](crate::settings::Settings) and
/// [`ConfigProvider`](crate::provider::ConfigProvider)
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The required Config type is not known
    #[error("The required Config type '{0}' is not known")]
    ConfigMissing(&'static str),
    /// The Config type is already registered
    #[error("The Config type '{0}' is already registered")]
    ConfigAlreadyRegistered(&'static str),
    /// A settings path was empty or walked through a non-object value
    #[error("Invalid settings path '{0}'")]
    InvalidPath(String),
    /// A value could not be converted from or into its JSON representation
    #[error("Settings value at '{path}' could not be converted: {source}")]
    Conversion {
        path: String,
        source: serde_json::Error,
    },
}
