use std::fmt::Display;

/// Coarse linguistic grouping used as a categorical movie feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LanguageFamily {
    African,
    EastAsian,
    EuropeanGermanic,
    EuropeanOther,
    EuropeanRomance,
    EuropeanSlavic,
    MiddleEasternCentralAsian,
    SouthAsian,
    SoutheastAsian,
    UnknownOther,
}

impl LanguageFamily {
    pub fn label(&self) -> &'static str {
        match self {
            LanguageFamily::African => "African",
            LanguageFamily::EastAsian => "East Asian",
            LanguageFamily::EuropeanGermanic => "European (Germanic)",
            LanguageFamily::EuropeanOther => "European (Other)",
            LanguageFamily::EuropeanRomance => "European (Romance)",
            LanguageFamily::EuropeanSlavic => "European (Slavic)",
            LanguageFamily::MiddleEasternCentralAsian => "Middle Eastern/Central Asian",
            LanguageFamily::SouthAsian => "South Asian",
            LanguageFamily::SoutheastAsian => "Southeast Asian",
            LanguageFamily::UnknownOther => "Unknown/Other",
        }
    }

    /// Family of an ISO 639-1 code as used in `original_language`
    pub fn from_iso_code(code: &str) -> LanguageFamily {
        use LanguageFamily::*;

        match code {
            "fr" | "es" | "ht" | "it" | "ca" | "pt" | "ro" | "gl" => EuropeanRomance,
            "en" | "de" | "nl" | "no" | "da" | "sv" | "is" | "lb" => EuropeanGermanic,
            "bg" | "pl" | "uk" | "ru" | "sk" | "cs" | "hr" | "mk" | "sr" | "bs" | "sl" => {
                EuropeanSlavic
            }
            "fi" | "hu" | "lv" | "ka" | "ga" | "el" | "ab" | "et" | "kl" | "lt" | "se" | "eu" => {
                EuropeanOther
            }
            "ja" | "ko" | "zh" | "cn" | "mn" | "bo" => EastAsian,
            "te" | "hi" | "ta" | "ml" | "kn" | "ur" | "pa" | "bn" | "dz" | "gu" => SouthAsian,
            "th" | "id" | "tl" | "jv" | "vi" | "km" | "ms" | "mi" | "su" => SoutheastAsian,
            "tr" | "ar" | "fa" | "kk" | "tt" | "he" | "hy" | "mt" => MiddleEasternCentralAsian,
            "zu" | "yo" | "xh" | "ig" | "ff" => African,
            _ => UnknownOther,
        }
    }

    /// Family of a spoken-language name as TMDb reports it (native spelling)
    pub fn from_spoken_name(name: &str) -> LanguageFamily {
        use LanguageFamily::*;

        match name {
            "Français" | "Español" | "Italiano" | "Català" | "Português" | "Română" | "Galego" => {
                EuropeanRomance
            }
            "English" | "Deutsch" | "Nederlands" | "Norsk" | "Dansk" | "svenska" | "Íslenska"
            | "Afrikaans" => EuropeanGermanic,
            "Pусский" | "Русский" | "български език" | "Український" | "Polski" | "Hrvatski"
            | "Slovenčina" | "Český" | "Srpski" | "Slovenščina" | "Bosanski" => EuropeanSlavic,
            "suomi" | "Lietuvių" | "Latin" | "Magyar" | "ქართული" | "euskera" | "Gaeilge"
            | "ελληνικά" | "shqip" | "Eesti" | "Latviešu" => EuropeanOther,
            "广州话 / 廣州話" | "日本語" | "普通话" | "한국어/조선말" => EastAsian,
            "हिन्दी" | "தமிழ்" | "తెలుగు" | "اردو" | "πੰਜਾਬੀ" | "ਪੰਜਾਬੀ" | "বাংলা" | "සිංහල" => {
                SouthAsian
            }
            "ภาษาไทย" | "Bahasa indonesia" | "Bahasa melayu" | "Tiếng Việt" => SoutheastAsian,
            "Türkçe" | "עִבְרִית" | "العربية" | "فارسی" | "қазақ" | "پښتو" | "Azərbaycan"
            | "Malti" => MiddleEasternCentralAsian,
            "isiZulu" | "Èdè Yorùbá" | "Wolof" | "Fulfulde" | "Èʋegbe" | "Kiswahili"
            | "Bamanankan" => African,
            // Includes "", "?????", "No Language" and constructed languages
            _ => UnknownOther,
        }
    }
}

impl Display for LanguageFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_codes() {
        assert_eq!(
            LanguageFamily::from_iso_code("en"),
            LanguageFamily::EuropeanGermanic
        );
        assert_eq!(
            LanguageFamily::from_iso_code("ja"),
            LanguageFamily::EastAsian
        );
        assert_eq!(
            LanguageFamily::from_iso_code("xx"),
            LanguageFamily::UnknownOther
        );
        assert_eq!(
            LanguageFamily::from_iso_code("qq"),
            LanguageFamily::UnknownOther
        );
    }

    #[test]
    fn test_spoken_names() {
        assert_eq!(
            LanguageFamily::from_spoken_name("Français"),
            LanguageFamily::EuropeanRomance
        );
        assert_eq!(
            LanguageFamily::from_spoken_name("العربية"),
            LanguageFamily::MiddleEasternCentralAsian
        );
        assert_eq!(
            LanguageFamily::from_spoken_name(""),
            LanguageFamily::UnknownOther
        );
        assert_eq!(
            LanguageFamily::from_spoken_name("Esperanto"),
            LanguageFamily::UnknownOther
        );
    }

    #[test]
    fn test_labels_sort_like_variants() {
        let mut families = vec![
            LanguageFamily::UnknownOther,
            LanguageFamily::EuropeanGermanic,
            LanguageFamily::African,
            LanguageFamily::MiddleEasternCentralAsian,
        ];
        families.sort();
        let labels: Vec<&str> = families.iter().map(|f| f.label()).collect();
        let mut sorted = labels.clone();
        sorted.sort();
        assert_eq!(labels, sorted);
    }
}
