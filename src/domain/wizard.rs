use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::profile::{
    Diet, Gender, MaritalStatus, Photo, PhotoSet, ProfileDetails, MAX_PHOTOS,
};

const MIN_AGE: u32 = 18;
const MIN_HEIGHT_CM: u16 = 90;
const MAX_HEIGHT_CM: u16 = 250;
const MAX_TEXT_LEN: usize = 2000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Personal,
    Contact,
    About,
    Photos,
}

impl WizardStep {
    pub const ALL: [WizardStep; 4] = [
        WizardStep::Personal,
        WizardStep::Contact,
        WizardStep::About,
        WizardStep::Photos,
    ];

    pub fn next(self) -> Option<WizardStep> {
        match self {
            WizardStep::Personal => Some(WizardStep::Contact),
            WizardStep::Contact => Some(WizardStep::About),
            WizardStep::About => Some(WizardStep::Photos),
            WizardStep::Photos => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub code: &'static str,
}

impl FieldError {
    pub fn new(field: &'static str, code: &'static str) -> Self {
        Self { field, code }
    }
}

/// Wizard input as the SPA accumulates it across steps.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileDraft {
    pub full_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub height_cm: Option<u16>,
    pub marital_status: Option<MaritalStatus>,
    pub education: Option<String>,
    pub occupation: Option<String>,
    pub diet: Option<Diet>,
    pub city: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub about: Option<String>,
    pub family_details: Option<String>,
    pub partner_expectations: Option<String>,
    pub photos: Vec<Photo>,
}

/// A draft that passed every step; ready for submission upstream.
#[derive(Clone, Debug, PartialEq)]
pub struct NewProfile {
    pub details: ProfileDetails,
    pub photos: PhotoSet,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

impl ProfileDraft {
    pub fn validate_step(&self, step: WizardStep, today: NaiveDate) -> Vec<FieldError> {
        let mut errors = Vec::new();
        match step {
            WizardStep::Personal => {
                if non_blank(&self.full_name).is_none() {
                    errors.push(FieldError::new("fullName", "required"));
                }
                match self.date_of_birth {
                    None => errors.push(FieldError::new("dateOfBirth", "required")),
                    Some(dob) if dob > today => {
                        errors.push(FieldError::new("dateOfBirth", "in_future"))
                    }
                    Some(dob) if today.years_since(dob).unwrap_or(0) < MIN_AGE => {
                        errors.push(FieldError::new("dateOfBirth", "under_age"))
                    }
                    Some(_) => {}
                }
                if self.gender.is_none() {
                    errors.push(FieldError::new("gender", "required"));
                }
                match self.height_cm {
                    None => errors.push(FieldError::new("heightCm", "required")),
                    Some(h) if !(MIN_HEIGHT_CM..=MAX_HEIGHT_CM).contains(&h) => {
                        errors.push(FieldError::new("heightCm", "out_of_range"))
                    }
                    Some(_) => {}
                }
                if self.marital_status.is_none() {
                    errors.push(FieldError::new("maritalStatus", "required"));
                }
            }
            WizardStep::Contact => {
                let email = non_blank(&self.contact_email);
                let phone = non_blank(&self.contact_phone);
                if email.is_none() && phone.is_none() {
                    errors.push(FieldError::new("contactPhone", "email_or_phone_required"));
                }
                if let Some(email) = email {
                    if !email.contains('@') {
                        errors.push(FieldError::new("contactEmail", "invalid_email"));
                    }
                }
                if let Some(phone) = phone {
                    let digits = phone.chars().filter(char::is_ascii_digit).count();
                    if !(7..=15).contains(&digits) {
                        errors.push(FieldError::new("contactPhone", "invalid_phone"));
                    }
                }
            }
            WizardStep::About => {
                for (field, value) in [
                    ("about", &self.about),
                    ("familyDetails", &self.family_details),
                    ("partnerExpectations", &self.partner_expectations),
                ] {
                    if value.as_ref().is_some_and(|text| text.len() > MAX_TEXT_LEN) {
                        errors.push(FieldError::new(field, "too_long"));
                    }
                }
            }
            WizardStep::Photos => {
                if self.photos.is_empty() {
                    errors.push(FieldError::new("photos", "at_least_one"));
                } else if self.photos.len() > MAX_PHOTOS {
                    errors.push(FieldError::new("photos", "too_many"));
                } else if self.photos.iter().filter(|p| p.is_primary).count() > 1 {
                    errors.push(FieldError::new("photos", "single_primary"));
                }
            }
        }
        errors
    }

    /// First step that still has errors, or `None` when the draft is complete.
    pub fn first_incomplete_step(&self, today: NaiveDate) -> Option<WizardStep> {
        WizardStep::ALL
            .into_iter()
            .find(|step| !self.validate_step(*step, today).is_empty())
    }

    pub fn validate(&self, today: NaiveDate) -> Result<NewProfile, Vec<FieldError>> {
        let errors: Vec<FieldError> = WizardStep::ALL
            .into_iter()
            .flat_map(|step| self.validate_step(step, today))
            .collect();
        if !errors.is_empty() {
            return Err(errors);
        }

        let missing = || vec![FieldError::new("draft", "incomplete")];
        let details = ProfileDetails {
            full_name: non_blank(&self.full_name).ok_or_else(missing)?.to_string(),
            date_of_birth: self.date_of_birth.ok_or_else(missing)?,
            gender: self.gender.ok_or_else(missing)?,
            height_cm: self.height_cm.ok_or_else(missing)?,
            marital_status: self.marital_status.ok_or_else(missing)?,
            education: non_blank(&self.education).map(str::to_string),
            occupation: non_blank(&self.occupation).map(str::to_string),
            diet: self.diet,
            city: non_blank(&self.city).map(str::to_string),
            contact_email: non_blank(&self.contact_email).map(str::to_lowercase),
            contact_phone: non_blank(&self.contact_phone).map(str::to_string),
            about: non_blank(&self.about).map(str::to_string),
            family_details: non_blank(&self.family_details).map(str::to_string),
            partner_expectations: non_blank(&self.partner_expectations).map(str::to_string),
        };

        Ok(NewProfile {
            details,
            photos: PhotoSet::normalized(self.photos.clone()),
        })
    }
}

#[cfg(test)]
pub(crate) fn complete_draft() -> ProfileDraft {
    ProfileDraft {
        full_name: Some("Anil Kumar".to_string()),
        date_of_birth: NaiveDate::from_ymd_opt(1994, 8, 2),
        gender: Some(Gender::Male),
        height_cm: Some(178),
        marital_status: Some(MaritalStatus::NeverMarried),
        contact_phone: Some("+91 98470 12345".to_string()),
        photos: vec![Photo {
            url: "https://media.example.org/anil.jpg".to_string(),
            storage_id: "anil".to_string(),
            is_primary: false,
        }],
        ..Default::default()
    }
}
