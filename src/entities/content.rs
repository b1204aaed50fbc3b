use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use crate::error::FolioError;

pub const MAX_TITLE_LEN: usize = 120;
pub const MAX_TEXT_LEN: usize = 2000;

/// The editable sections of the portfolio site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Hero,
    Services,
    Skills,
    Approach,
    Testimonials,
    Clients,
}

impl Section {
    pub const ALL: [Section; 6] = [
        Section::Hero,
        Section::Services,
        Section::Skills,
        Section::Approach,
        Section::Testimonials,
        Section::Clients,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Hero => "hero",
            Section::Services => "services",
            Section::Skills => "skills",
            Section::Approach => "approach",
            Section::Testimonials => "testimonials",
            Section::Clients => "clients",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = FolioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hero" => Ok(Section::Hero),
            "services" => Ok(Section::Services),
            "skills" => Ok(Section::Skills),
            "approach" => Ok(Section::Approach),
            "testimonials" => Ok(Section::Testimonials),
            "clients" => Ok(Section::Clients),
            other => Err(FolioError::UnknownSection(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeroContent {
    pub title: String,
    pub subtitle: String,
    #[serde(default)]
    pub cta_label: String,
    #[serde(default)]
    pub cta_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceItem {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillItem {
    pub name: String,
    pub level: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessStep {
    pub title: String,
    pub description: String,
    pub order: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Testimonial {
    pub author: String,
    #[serde(default)]
    pub role: String,
    pub quote: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientLogo {
    pub name: String,
    #[serde(default)]
    pub logo_url: String,
    #[serde(default)]
    pub website: String,
}

type FieldErrors = Vec<(String, String)>;

fn require(errors: &mut FieldErrors, field: &str, value: &str, max_len: usize) {
    if value.trim().is_empty() {
        errors.push((field.to_string(), "must not be empty".to_string()));
    } else if value.len() > max_len {
        errors.push((field.to_string(), format!("must be at most {max_len} characters")));
    }
}

fn optional(errors: &mut FieldErrors, field: &str, value: &str, max_len: usize) {
    if value.len() > max_len {
        errors.push((field.to_string(), format!("must be at most {max_len} characters")));
    }
}

fn decode_error(errors: &mut FieldErrors, section: Section, err: serde_json::Error) {
    errors.push((section.to_string(), format!("invalid shape: {err}")));
}

/// Structural validation of a section payload. Returns the per-field error
/// list; empty means the payload is acceptable.
pub fn validate_section(section: Section, content: &Value) -> FieldErrors {
    let mut errors = FieldErrors::new();
    match section {
        Section::Hero => match serde_json::from_value::<HeroContent>(content.clone()) {
            Ok(hero) => {
                require(&mut errors, "title", &hero.title, MAX_TITLE_LEN);
                require(&mut errors, "subtitle", &hero.subtitle, MAX_TEXT_LEN);
                optional(&mut errors, "ctaLabel", &hero.cta_label, MAX_TITLE_LEN);
                optional(&mut errors, "ctaUrl", &hero.cta_url, MAX_TEXT_LEN);
            }
            Err(err) => decode_error(&mut errors, section, err),
        },
        Section::Services => match serde_json::from_value::<Vec<ServiceItem>>(content.clone()) {
            Ok(items) => {
                for (i, item) in items.iter().enumerate() {
                    require(&mut errors, &format!("[{i}].title"), &item.title, MAX_TITLE_LEN);
                    require(&mut errors, &format!("[{i}].description"), &item.description, MAX_TEXT_LEN);
                }
            }
            Err(err) => decode_error(&mut errors, section, err),
        },
        Section::Skills => match serde_json::from_value::<Vec<SkillItem>>(content.clone()) {
            Ok(items) => {
                for (i, item) in items.iter().enumerate() {
                    require(&mut errors, &format!("[{i}].name"), &item.name, MAX_TITLE_LEN);
                    if item.level > 100 {
                        errors.push((format!("[{i}].level"), "must be between 0 and 100".to_string()));
                    }
                }
            }
            Err(err) => decode_error(&mut errors, section, err),
        },
        Section::Approach => match serde_json::from_value::<Vec<ProcessStep>>(content.clone()) {
            Ok(steps) => {
                for (i, step) in steps.iter().enumerate() {
                    require(&mut errors, &format!("[{i}].title"), &step.title, MAX_TITLE_LEN);
                    require(&mut errors, &format!("[{i}].description"), &step.description, MAX_TEXT_LEN);
                }
            }
            Err(err) => decode_error(&mut errors, section, err),
        },
        Section::Testimonials => match serde_json::from_value::<Vec<Testimonial>>(content.clone()) {
            Ok(items) => {
                for (i, item) in items.iter().enumerate() {
                    require(&mut errors, &format!("[{i}].author"), &item.author, MAX_TITLE_LEN);
                    require(&mut errors, &format!("[{i}].quote"), &item.quote, MAX_TEXT_LEN);
                }
            }
            Err(err) => decode_error(&mut errors, section, err),
        },
        Section::Clients => match serde_json::from_value::<Vec<ClientLogo>>(content.clone()) {
            Ok(items) => {
                for (i, item) in items.iter().enumerate() {
                    require(&mut errors, &format!("[{i}].name"), &item.name, MAX_TITLE_LEN);
                }
            }
            Err(err) => decode_error(&mut errors, section, err),
        },
    }
    errors
}

/// Starter content inserted by `folio seed`.
pub fn default_content(section: Section) -> Value {
    match section {
        Section::Hero => json!({
            "title": "Design that ships",
            "subtitle": "Portfolio of selected work in product design and engineering.",
            "ctaLabel": "Get in touch",
            "ctaUrl": "/contact",
        }),
        Section::Services => json!([
            { "title": "Product design", "description": "From discovery to polished interface.", "icon": "pen" },
            { "title": "Engineering", "description": "Full-stack builds with an eye on the details.", "icon": "code" },
        ]),
        Section::Skills => json!([
            { "name": "Interaction design", "level": 90 },
            { "name": "Systems programming", "level": 75 },
        ]),
        Section::Approach => json!([
            { "title": "Listen", "description": "Understand the problem before sketching.", "order": 1 },
            { "title": "Prototype", "description": "Make it real early, throw the bad parts away.", "order": 2 },
            { "title": "Deliver", "description": "Ship, measure, iterate.", "order": 3 },
        ]),
        Section::Testimonials => json!([
            { "author": "A. Client", "role": "Founder", "quote": "Delivered exactly what we needed, on time." },
        ]),
        Section::Clients => json!([
            { "name": "Acme Co", "logoUrl": "/uploads/acme.png", "website": "https://acme.example" },
        ]),
    }
}
