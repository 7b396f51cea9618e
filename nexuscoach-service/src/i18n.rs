use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, warn};
use unic_langid::LanguageIdentifier;

/// Locale used when the client sends none or one we don't ship
pub const DEFAULT_LOCALE: &str = "pt-BR";

const EN_FTL: &str = include_str!("../locales/en.ftl");
const PT_BR_FTL: &str = include_str!("../locales/pt-BR.ftl");

/// Map a client locale onto one of the shipped bundles.
///
/// Anything starting with `en` is English; everything else (including no
/// locale at all) is Brazilian Portuguese.
pub fn resolve_locale(locale: Option<&str>) -> &'static str {
    match locale {
        Some(l) if l.trim().to_lowercase().starts_with("en") => "en",
        _ => DEFAULT_LOCALE,
    }
}

/// Whether a locale resolves to the English bundle
pub fn is_english(locale: &str) -> bool {
    resolve_locale(Some(locale)) == "en"
}

/// Internationalization service using Fluent (thread-safe)
pub struct I18n {
    bundles: RwLock<HashMap<String, FluentBundle<FluentResource>>>,
    default_locale: String,
}

impl I18n {
    /// Create a new i18n service with the embedded `en` and `pt-BR` tables
    pub fn new() -> Self {
        let i18n = Self {
            bundles: RwLock::new(HashMap::new()),
            default_locale: DEFAULT_LOCALE.to_string(),
        };

        for (locale, content) in [("en", EN_FTL), (DEFAULT_LOCALE, PT_BR_FTL)] {
            if let Err(e) = i18n.add_locale(locale, content) {
                warn!(locale, error = %e, "Failed to load embedded translations");
            }
        }

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
        // Replies are spoken by TTS; bidi isolation marks would be read aloud.
        bundle.set_use_isolating(false);
        bundle
            .add_resource(resource)
            .map_err(|errors| format!("Failed to add resource to bundle: {:?}", errors))?;

        let mut bundles = self.bundles.write().unwrap();
        bundles.insert(locale.to_string(), bundle);

        debug!(locale = %locale, "Loaded translations");

        Ok(())
    }

    /// Get a translated message
    pub fn get(&self, locale: &str, key: &str, args: Option<&FluentArgs>) -> String {
        // Try requested locale, then its resolved bundle, then default, then key
        self.try_get(locale, key, args)
            .or_else(|| self.try_get(resolve_locale(Some(locale)), key, args))
            .or_else(|| self.try_get(&self.default_locale, key, args))
            .unwrap_or_else(|| key.to_string())
    }

    /// Try to get a translation from a specific locale
    fn try_get(&self, locale: &str, key: &str, args: Option<&FluentArgs>) -> Option<String> {
        let bundles = self.bundles.read().unwrap();
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

    /// Whether a key exists in the resolved bundle for `locale`
    pub fn has(&self, locale: &str, key: &str) -> bool {
        let bundles = self.bundles.read().unwrap();
        bundles
            .get(resolve_locale(Some(locale)))
            .is_some_and(|b| b.has_message(key))
    }
}

impl Default for I18n {
    fn default() -> Self {
        Self::new()
    }
}
