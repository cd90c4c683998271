use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, warn};
use unic_langid::LanguageIdentifier;

/// Internationalization service using Fluent (thread-safe)
pub struct I18n {
    bundles: RwLock<HashMap<String, FluentBundle<FluentResource>>>,
    default_locale: String,
}

impl I18n {
    /// Create a new i18n service with embedded English translations
    pub fn new() -> Self {
        let i18n = Self {
            bundles: RwLock::new(HashMap::new()),
            default_locale: "en".to_string(),
        };

        i18n.load_embedded_en();

        i18n
    }

    /// Add a locale with translations
    pub fn add_locale(&self, locale: &str, content: &str) -> Result<(), String> {
        let lang_id: LanguageIdentifier = locale
            .parse()
            .map_err(|e| format!("Invalid locale '{}': {}", locale, e))?;

        let resource = FluentResource::try_new(content.to_string())
            .map_err(|(_, errors)| format!("Failed to parse Fluent resource: {:?}", errors))?;

        let mut bundle = FluentBundle::new_concurrent(vec![lang_id]);
        bundle
            .add_resource(resource)
            .map_err(|errors| format!("Failed to add resource to bundle: {:?}", errors))?;

        let mut bundles = self
            .bundles
            .write()
            .map_err(|_| "Translation store lock poisoned".to_string())?;
        bundles.insert(locale.to_string(), bundle);

        debug!(locale = %locale, "Loaded translations");

        Ok(())
    }

    /// Get a translated message
    pub fn get(&self, locale: &str, key: &str, args: Option<&FluentArgs>) -> String {
        // Requested locale, then default locale, then the key itself
        self.try_get(locale, key, args)
            .or_else(|| self.try_get(&self.default_locale, key, args))
            .unwrap_or_else(|| key.to_string())
    }

    fn try_get(&self, locale: &str, key: &str, args: Option<&FluentArgs>) -> Option<String> {
        let bundles = self.bundles.read().ok()?;
        let bundle = bundles.get(locale)?;
        let message = bundle.get_message(key)?;
        let pattern = message.value()?;

        let mut errors = vec![];
        let result = bundle.format_pattern(pattern, args, &mut errors);

        if !errors.is_empty() {
            warn!(key = %key, errors = ?errors, "Fluent formatting errors");
        }

        Some(result.to_string())
    }

    /// Get a translated message with arguments
    pub fn format(&self, locale: &str, key: &str, args: &[(&str, &str)]) -> String {
        let mut fluent_args = FluentArgs::new();
        for (k, v) in args {
            fluent_args.set(*k, *v);
        }
        self.get(locale, key, Some(&fluent_args))
    }

    fn load_embedded_en(&self) {
        let en_translations = r#"
# Folio Service - English Translations

# Errors
error-invalid-credentials = Invalid credentials
error-account-inactive = Account is not active
error-email-taken = User with this email already exists
error-unauthorized = Not authorized to access this route
error-token-expired = Session expired, please log in again
error-file-not-found = File not found
error-files-not-found = One or more files not found
error-file-missing-on-disk = File { $name } not found on disk
error-merge-not-found = Merge operation not found
error-processing = Error processing PDF
error-internal = An internal error occurred

# Auth
auth-register-success = User registered successfully
auth-login-success = Login successful
auth-logout-success = Logout successful. Please remove token from client.

# Files
files-upload-success = { $count } file(s) uploaded successfully
file-update-success = File updated successfully
file-delete-success = File deleted successfully

# Editor
editor-modify-success = PDF modified successfully

# Merge
merge-success = PDFs merged successfully
merge-annotate-success = Annotation added successfully

# Health
health-status-healthy = Service is healthy
"#;

        if let Err(e) = self.add_locale("en", en_translations) {
            warn!(error = %e, "Failed to load embedded English translations");
        }
    }
}

impl Default for I18n {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_message() {
        let i18n = I18n::new();

        let msg = i18n.get("en", "error-invalid-credentials", None);
        assert_eq!(msg, "Invalid credentials");
    }

    #[test]
    fn test_format_message() {
        let i18n = I18n::new();

        let msg = i18n.format("en", "files-upload-success", &[("count", "3")]);
        // Fluent wraps placeables in bidi isolation marks (U+2068 / U+2069)
        assert_eq!(msg, "\u{2068}3\u{2069} file(s) uploaded successfully");
    }

    #[test]
    fn test_fallback_to_key() {
        let i18n = I18n::new();

        let msg = i18n.get("en", "nonexistent-key", None);
        assert_eq!(msg, "nonexistent-key");
    }

    #[test]
    fn test_fallback_to_default_locale() {
        let i18n = I18n::new();

        let msg = i18n.get("fr", "file-delete-success", None);
        assert_eq!(msg, "File deleted successfully");
    }
}
