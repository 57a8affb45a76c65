//! Assistant edits: a partial document merged over the stored one.
//!
//! Top-level fields replace wholesale when present. `personalInfo` merges one level
//! deep so the assistant can change a phone number without resending the rest.

use serde::{Deserialize, Serialize};

use crate::models::resume::{
    Certification, Education, Experience, Language, PersonalInfo, Project, ResumeData,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfoPatch {
    pub name: Option<String>,
    pub title: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub linkedin: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumePatch {
    pub personal_info: Option<PersonalInfoPatch>,
    pub summary: Option<String>,
    pub experience: Option<Vec<Experience>>,
    pub education: Option<Vec<Education>>,
    pub skills: Option<Vec<String>>,
    pub certifications: Option<Vec<Certification>>,
    pub projects: Option<Vec<Project>>,
    pub languages: Option<Vec<Language>>,
}

impl ResumePatch {
    pub fn is_empty(&self) -> bool {
        *self == ResumePatch::default()
    }
}

fn merge_personal_info(current: &PersonalInfo, patch: PersonalInfoPatch) -> PersonalInfo {
    PersonalInfo {
        name: patch.name.unwrap_or_else(|| current.name.clone()),
        title: patch.title.unwrap_or_else(|| current.title.clone()),
        phone: patch.phone.unwrap_or_else(|| current.phone.clone()),
        email: patch.email.unwrap_or_else(|| current.email.clone()),
        linkedin: patch.linkedin.unwrap_or_else(|| current.linkedin.clone()),
        location: patch.location.unwrap_or_else(|| current.location.clone()),
    }
}

/// Returns `current` with `patch` applied; `current` is left untouched.
pub fn apply_patch(current: &ResumeData, patch: ResumePatch) -> ResumeData {
    let ResumePatch {
        personal_info,
        summary,
        experience,
        education,
        skills,
        certifications,
        projects,
        languages,
    } = patch;

    ResumeData {
        personal_info: match personal_info {
            Some(p) => merge_personal_info(&current.personal_info, p),
            None => current.personal_info.clone(),
        },
        summary: summary.unwrap_or_else(|| current.summary.clone()),
        experience: experience.unwrap_or_else(|| current.experience.clone()),
        education: education.unwrap_or_else(|| current.education.clone()),
        skills: skills.unwrap_or_else(|| current.skills.clone()),
        certifications: certifications.unwrap_or_else(|| current.certifications.clone()),
        projects: projects.unwrap_or_else(|| current.projects.clone()),
        languages: languages.unwrap_or_else(|| current.languages.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::layout::tests::sample_resume;

    #[test]
    fn test_empty_patch_is_identity() {
        let current = sample_resume();
        assert!(ResumePatch::default().is_empty());
        assert_eq!(apply_patch(&current, ResumePatch::default()), current);
    }

    #[test]
    fn test_personal_info_merges_field_by_field() {
        let current = sample_resume();
        let patch: ResumePatch =
            serde_json::from_str(r#"{"personalInfo": {"phone": "+1 555 0100"}}"#).unwrap();
        let merged = apply_patch(&current, patch);
        assert_eq!(merged.personal_info.phone, "+1 555 0100");
        assert_eq!(merged.personal_info.name, "Ved Gupta", "untouched fields survive");
        assert_eq!(merged.personal_info.email, current.personal_info.email);
        assert_eq!(merged.experience, current.experience);
    }

    #[test]
    fn test_lists_are_replaced_wholesale() {
        let current = sample_resume();
        let patch: ResumePatch = serde_json::from_str(
            r#"{"skills": ["Go"], "languages": [], "summary": "Rewritten"}"#,
        )
        .unwrap();
        let merged = apply_patch(&current, patch);
        assert_eq!(merged.skills, vec!["Go".to_string()]);
        assert!(merged.languages.is_empty(), "an empty list clears the section");
        assert_eq!(merged.summary, "Rewritten");
        assert_eq!(merged.projects, current.projects);
    }
}
