//! Merge tag substitution
//!
//! Tags use the Mandrill `*|NAME|*` syntax. Names match case-insensitively;
//! tags without a value are left in place.

use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct MergeEngine {
    /// Keyed by upper-cased name
    variables: HashMap<String, String>,
}

impl MergeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable value, replacing any earlier value of the same name
    pub fn set(&mut self, name: impl AsRef<str>, value: impl Into<String>) -> &mut Self {
        self.variables
            .insert(name.as_ref().trim().to_uppercase(), value.into());
        self
    }

    pub fn set_all<I, K, V>(&mut self, iter: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (k, v) in iter {
            self.set(k, v);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Render a template string, replacing `*|name|*` with values
    pub fn render(&self, template: &str) -> String {
        if self.variables.is_empty() || !template.contains("*|") {
            return template.to_string();
        }

        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("*|") {
            out.push_str(&rest[..start]);
            let after_open = &rest[start + 2..];

            match after_open.find("|*") {
                Some(end) => {
                    let name = &after_open[..end];
                    match self.variables.get(&name.trim().to_uppercase()) {
                        Some(value) => out.push_str(value),
                        None => {
                            out.push_str("*|");
                            out.push_str(name);
                            out.push_str("|*");
                        }
                    }
                    rest = &after_open[end + 2..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }

        out.push_str(rest);
        out
    }
}
