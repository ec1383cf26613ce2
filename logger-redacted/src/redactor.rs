use regex::Regex;
use lazy_static::lazy_static;
use sha2::{Sha256, Digest};
use base64::{Engine as _, engine::general_purpose};

lazy_static! {
    static ref EMAIL_REGEX: Regex = Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap();
    static ref PHONE_REGEX: Regex = Regex::new(r"(?:\+1[-.\s]?)?\(?\b[0-9]{3}\)?[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}\b").unwrap();
    static ref POLICY_REGEX: Regex = Regex::new(r"\bPOL-\d+\b").unwrap();
    // "patient John Doe" / "patient Mary-Ann O'Neil": capitalised words after the keyword
    static ref PATIENT_NAME_REGEX: Regex = Regex::new(r"\b([Pp]atient)\s+[A-Z][\w'-]*(?:\s+[A-Z][\w'-]*)*").unwrap();
}

/// PHI redaction configuration
#[derive(Debug, Clone)]
pub struct RedactionConfig {
    pub redact_emails: bool,
    pub redact_phones: bool,
    pub redact_policy_ids: bool,
    pub redact_patient_names: bool,
    pub hash_for_correlation: bool,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            redact_emails: true,
            redact_phones: true,
            redact_policy_ids: true,
            redact_patient_names: true,
            hash_for_correlation: true,
        }
    }
}

/// PHI redactor for log messages
#[derive(Debug, Clone)]
pub struct PiiRedactor {
    config: RedactionConfig,
}

impl Default for PiiRedactor {
    fn default() -> Self {
        Self::new(RedactionConfig::default())
    }
}

impl PiiRedactor {
    pub fn new(config: RedactionConfig) -> Self {
        Self { config }
    }

    pub fn redact(&self, text: &str) -> String {
        let mut result = text.to_string();

        if self.config.redact_patient_names {
            result = self.redact_patient_names(&result);
        }

        if self.config.redact_policy_ids {
            result = self.redact_policy_ids(&result);
        }

        if self.config.redact_emails {
            result = self.redact_emails(&result);
        }

        if self.config.redact_phones {
            result = self.redact_phones(&result);
        }

        result
    }

    fn redact_patient_names(&self, text: &str) -> String {
        PATIENT_NAME_REGEX.replace_all(text, |caps: &regex::Captures| {
            let keyword = caps.get(1).map_or("patient", |m| m.as_str());
            if self.config.hash_for_correlation {
                format!("{keyword} NAME[{}]", self.hash_value(&caps[0]))
            } else {
                format!("{keyword} [REDACTED]")
            }
        }).to_string()
    }

    fn redact_policy_ids(&self, text: &str) -> String {
        POLICY_REGEX.replace_all(text, |caps: &regex::Captures| {
            if self.config.hash_for_correlation {
                format!("POLICY[{}]", self.hash_value(&caps[0]))
            } else {
                "POL-****".to_string()
            }
        }).to_string()
    }

    fn redact_emails(&self, text: &str) -> String {
        EMAIL_REGEX.replace_all(text, |caps: &regex::Captures| {
            let email = &caps[0];
            if self.config.hash_for_correlation {
                format!("EMAIL[{}]", self.hash_value(email))
            } else {
                match email.split_once('@') {
                    Some((local, domain)) => format!(
                        "{}***@{}***",
                        local.chars().next().unwrap_or('*'),
                        domain.chars().next().unwrap_or('*')
                    ),
                    None => "***@***".to_string(),
                }
            }
        }).to_string()
    }

    fn redact_phones(&self, text: &str) -> String {
        PHONE_REGEX.replace_all(text, |caps: &regex::Captures| {
            if self.config.hash_for_correlation {
                format!("PHONE[{}]", self.hash_value(&caps[0]))
            } else {
                "(***) ***-****".to_string()
            }
        }).to_string()
    }

    fn hash_value(&self, value: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(value.as_bytes());
        let result = hasher.finalize();
        general_purpose::STANDARD.encode(result.get(..8).unwrap_or_default()) // first 8 bytes keep the tag short
    }
}
