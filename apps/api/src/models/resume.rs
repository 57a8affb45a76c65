use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

// ────────────────────────────────────────────────────────────────────────────
// Document model
// ────────────────────────────────────────────────────────────────────────────

/// The canonical résumé document. Every list is rendered top-to-bottom in
/// insertion order; duplicates are legal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResumeData {
    pub personal_info: PersonalInfo,
    pub summary: String,
    pub experience: Vec<Experience>,
    pub education: Vec<Education>,
    pub skills: Vec<String>,
    pub certifications: Vec<Certification>,
    pub projects: Vec<Project>,
    pub languages: Vec<Language>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonalInfo {
    pub name: String,
    pub title: String,
    pub phone: String,
    pub email: String,
    /// Bare handle or host path, e.g. `linkedin.com/in/someone`.
    pub linkedin: String,
    pub location: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Experience {
    pub title: String,
    pub company: String,
    pub location: String,
    pub start_date: String,
    pub end_date: String,
    pub description: String,
    pub responsibilities: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Education {
    pub degree: String,
    pub institution: String,
    pub location: String,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Certification {
    pub title: String,
    pub issuer: String,
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Comma-separated skill list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Project {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    pub description: String,
    pub technologies: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Language {
    pub name: String,
    pub level: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Blank detection — a blank entry never produces output
// ────────────────────────────────────────────────────────────────────────────

fn blank(s: &str) -> bool {
    s.trim().is_empty()
}

fn blank_opt(s: &Option<String>) -> bool {
    s.as_deref().map_or(true, blank)
}

impl Experience {
    pub fn is_blank(&self) -> bool {
        blank(&self.title)
            && blank(&self.company)
            && blank(&self.location)
            && blank(&self.start_date)
            && blank(&self.end_date)
            && blank(&self.description)
            && self.responsibilities.iter().all(|r| blank(r))
    }

    /// Responsibilities with blank entries dropped, order preserved.
    pub fn visible_responsibilities(&self) -> impl Iterator<Item = &str> {
        self.responsibilities
            .iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
    }
}

impl Education {
    pub fn is_blank(&self) -> bool {
        blank(&self.degree)
            && blank(&self.institution)
            && blank(&self.location)
            && blank(&self.start_date)
            && blank(&self.end_date)
    }
}

impl Certification {
    pub fn is_blank(&self) -> bool {
        blank(&self.title)
            && blank(&self.issuer)
            && blank(&self.date)
            && blank_opt(&self.link)
            && blank_opt(&self.skills)
    }
}

impl Project {
    pub fn is_blank(&self) -> bool {
        blank(&self.title)
            && blank_opt(&self.start_date)
            && blank_opt(&self.end_date)
            && blank(&self.description)
            && blank(&self.technologies)
    }
}

impl Language {
    pub fn is_blank(&self) -> bool {
        blank(&self.name) && blank(&self.level)
    }
}

impl ResumeData {
    /// Skills with blank entries dropped, order preserved.
    pub fn visible_skills(&self) -> Vec<&str> {
        self.skills
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Persisted record
// ────────────────────────────────────────────────────────────────────────────

/// A stored résumé, always owned by exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub data: Json<ResumeData>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
