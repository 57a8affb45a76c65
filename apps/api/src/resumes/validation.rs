//! Document validation for create, update and assistant merges.
//!
//! Every rule is checked and every failure collected, so a client gets the whole list in
//! one round trip. Required means non-empty; whitespace is not trimmed.

use serde::Serialize;

use crate::errors::AppError;
use crate::models::resume::ResumeData;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// JSON path of the offending field, e.g. `experience[1].company`.
    pub field: String,
    pub message: String,
}

#[derive(Debug, Default)]
struct Issues(Vec<ValidationIssue>);

impl Issues {
    fn require(&mut self, field: impl Into<String>, value: &str, message: &str) {
        if value.is_empty() {
            self.push(field, message);
        }
    }

    fn push(&mut self, field: impl Into<String>, message: &str) {
        self.0.push(ValidationIssue {
            field: field.into(),
            message: message.to_string(),
        });
    }
}

/// Loose syntactic check: one `@`, a non-empty local part and a dotted domain.
pub fn is_plausible_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}

pub fn is_http_url(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    let rest = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"));
    match rest {
        Some(host) => {
            let host = host.split(['/', '?', '#']).next().unwrap_or_default();
            !host.is_empty() && !host.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

pub fn validate_name(name: &str) -> Vec<ValidationIssue> {
    let mut issues = Issues::default();
    issues.require("name", name, "Resume name is required");
    issues.0
}

pub fn validate_resume_data(data: &ResumeData) -> Vec<ValidationIssue> {
    let mut issues = Issues::default();

    let info = &data.personal_info;
    issues.require("personalInfo.name", &info.name, "Name is required");
    issues.require("personalInfo.title", &info.title, "Title is required");
    issues.require("personalInfo.phone", &info.phone, "Phone is required");
    if !is_plausible_email(&info.email) {
        issues.push("personalInfo.email", "Invalid email address");
    }
    issues.require("personalInfo.location", &info.location, "Location is required");
    issues.require("summary", &data.summary, "Summary is required");

    for (i, exp) in data.experience.iter().enumerate() {
        let at = |f: &str| format!("experience[{i}].{f}");
        issues.require(at("title"), &exp.title, "Job title is required");
        issues.require(at("company"), &exp.company, "Company is required");
        issues.require(at("location"), &exp.location, "Location is required");
        issues.require(at("startDate"), &exp.start_date, "Start date is required");
        issues.require(at("endDate"), &exp.end_date, "End date is required");
    }

    for (i, edu) in data.education.iter().enumerate() {
        let at = |f: &str| format!("education[{i}].{f}");
        issues.require(at("degree"), &edu.degree, "Degree is required");
        issues.require(at("institution"), &edu.institution, "Institution is required");
        issues.require(at("location"), &edu.location, "Location is required");
        issues.require(at("startDate"), &edu.start_date, "Start date is required");
        issues.require(at("endDate"), &edu.end_date, "End date is required");
    }

    for (i, cert) in data.certifications.iter().enumerate() {
        let at = |f: &str| format!("certifications[{i}].{f}");
        issues.require(at("title"), &cert.title, "Certification title is required");
        issues.require(at("issuer"), &cert.issuer, "Issuer is required");
        issues.require(at("date"), &cert.date, "Date is required");
        if let Some(link) = cert.link.as_deref() {
            if !link.is_empty() && !is_http_url(link) {
                issues.push(at("link"), "Invalid URL");
            }
        }
    }

    for (i, project) in data.projects.iter().enumerate() {
        let at = |f: &str| format!("projects[{i}].{f}");
        issues.require(at("title"), &project.title, "Project title is required");
        issues.require(at("description"), &project.description, "Description is required");
        issues.require(at("technologies"), &project.technologies, "Technologies are required");
    }

    for (i, language) in data.languages.iter().enumerate() {
        let at = |f: &str| format!("languages[{i}].{f}");
        issues.require(at("name"), &language.name, "Language name is required");
        issues.require(at("level"), &language.level, "Proficiency level is required");
    }

    issues.0
}

/// Turns a non-empty issue list into a `400 VALIDATION_ERROR`.
pub fn ensure_valid(issues: Vec<ValidationIssue>) -> Result<(), AppError> {
    if issues.is_empty() {
        return Ok(());
    }
    let message = issues
        .iter()
        .map(|i| format!("{}: {}", i.field, i.message))
        .collect::<Vec<_>>()
        .join("; ");
    Err(AppError::Validation(message))
}
