use std::fmt;

/// Access credential sent as a query parameter.
///
/// Never serialized and redacted from `Debug`, so it cannot leak into logs or
/// into the checkpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    param: String,
    value: String,
}

impl Credential {
    pub fn new(param: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            param: param.into(),
            value: value.into(),
        }
    }

    /// Conventional `access_token=<value>` credential.
    pub fn access_token(value: impl Into<String>) -> Self {
        Self::new("access_token", value)
    }

    pub fn param(&self) -> &str {
        &self.param
    }

    pub fn expose(&self) -> &str {
        &self.value
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Whether the secret value occurs anywhere in `text`.
    pub fn appears_in(&self, text: &str) -> bool {
        !self.value.is_empty() && text.contains(&self.value)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("param", &self.param)
            .field("value", &"<redacted>")
            .finish()
    }
}
