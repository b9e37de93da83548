use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::{IntoParams, ToSchema};

pub const MAX_PHOTOS: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MaritalStatus {
    NeverMarried,
    Divorced,
    Widowed,
    Separated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Diet {
    Vegetarian,
    Eggetarian,
    NonVegetarian,
    Vegan,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub url: String,
    #[serde(alias = "publicId")]
    pub storage_id: String,
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PhotoError {
    #[error("a profile holds at most {MAX_PHOTOS} photos")]
    TooMany,
    #[error("exactly one photo must be primary")]
    PrimaryCount,
    #[error("photo {0} is not part of this profile")]
    Unknown(String),
    #[error("photo {0} is already attached")]
    Duplicate(String),
}

/// Ordered photo list: 0 to [`MAX_PHOTOS`] entries, exactly one primary when non-empty.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Photo>", into = "Vec<Photo>")]
pub struct PhotoSet(Vec<Photo>);

impl PhotoSet {
    pub fn new(photos: Vec<Photo>) -> Result<Self, PhotoError> {
        if photos.len() > MAX_PHOTOS {
            return Err(PhotoError::TooMany);
        }
        let primaries = photos.iter().filter(|photo| photo.is_primary).count();
        if !photos.is_empty() && primaries != 1 {
            return Err(PhotoError::PrimaryCount);
        }
        Ok(Self(photos))
    }

    /// Lenient decoding for upstream data: keeps the first five photos and
    /// elects a single primary.
    pub fn normalized(mut photos: Vec<Photo>) -> Self {
        if photos.len() > MAX_PHOTOS {
            tracing::warn!(count = photos.len(), "upstream profile exceeds photo limit");
            photos.truncate(MAX_PHOTOS);
        }
        let primary = photos
            .iter()
            .position(|photo| photo.is_primary)
            .unwrap_or(0);
        for (index, photo) in photos.iter_mut().enumerate() {
            photo.is_primary = index == primary;
        }
        Self(photos)
    }

    pub fn as_slice(&self) -> &[Photo] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn primary(&self) -> Option<&Photo> {
        self.0.iter().find(|photo| photo.is_primary)
    }

    pub fn add(&mut self, mut photo: Photo) -> Result<(), PhotoError> {
        if self.0.len() >= MAX_PHOTOS {
            return Err(PhotoError::TooMany);
        }
        if self.0.iter().any(|p| p.storage_id == photo.storage_id) {
            return Err(PhotoError::Duplicate(photo.storage_id));
        }
        if self.0.is_empty() {
            photo.is_primary = true;
        } else if photo.is_primary {
            for existing in &mut self.0 {
                existing.is_primary = false;
            }
        }
        self.0.push(photo);
        Ok(())
    }

    pub fn remove(&mut self, storage_id: &str) -> Result<Photo, PhotoError> {
        let index = self
            .0
            .iter()
            .position(|photo| photo.storage_id == storage_id)
            .ok_or_else(|| PhotoError::Unknown(storage_id.to_string()))?;
        let removed = self.0.remove(index);
        if removed.is_primary {
            if let Some(first) = self.0.first_mut() {
                first.is_primary = true;
            }
        }
        Ok(removed)
    }

    pub fn set_primary(&mut self, storage_id: &str) -> Result<(), PhotoError> {
        if !self.0.iter().any(|photo| photo.storage_id == storage_id) {
            return Err(PhotoError::Unknown(storage_id.to_string()));
        }
        for photo in &mut self.0 {
            photo.is_primary = photo.storage_id == storage_id;
        }
        Ok(())
    }
}

impl TryFrom<Vec<Photo>> for PhotoSet {
    type Error = PhotoError;

    fn try_from(photos: Vec<Photo>) -> Result<Self, Self::Error> {
        Self::new(photos)
    }
}

impl From<PhotoSet> for Vec<Photo> {
    fn from(set: PhotoSet) -> Self {
        set.0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDetails {
    pub full_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub height_cm: u16,
    pub marital_status: MaritalStatus,
    #[serde(default)]
    pub education: Option<String>,
    #[serde(default)]
    pub occupation: Option<String>,
    #[serde(default)]
    pub diet: Option<Diet>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub about: Option<String>,
    #[serde(default)]
    pub family_details: Option<String>,
    #[serde(default)]
    pub partner_expectations: Option<String>,
}

impl ProfileDetails {
    pub fn age_on(&self, today: NaiveDate) -> u32 {
        today.years_since(self.date_of_birth).unwrap_or(0)
    }
}

/// Profile as stored upstream, with the raw payment and visibility flags.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(alias = "user")]
    pub owner_id: String,
    #[serde(flatten)]
    pub details: ProfileDetails,
    #[serde(default)]
    pub photos: Vec<Photo>,
    #[serde(default)]
    pub payment_required: bool,
    #[serde(default)]
    pub is_paid: bool,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default)]
    pub scheduled_deletion: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    NotRequired,
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn from_flags(payment_required: bool, is_paid: bool) -> Self {
        match (payment_required, is_paid) {
            (false, false) => PaymentStatus::NotRequired,
            (true, false) => PaymentStatus::Pending,
            (true, true) => PaymentStatus::Paid,
            (false, true) => {
                tracing::warn!("profile marked paid without requiring payment");
                PaymentStatus::NotRequired
            }
        }
    }

    pub fn payment_required(self) -> bool {
        !matches!(self, PaymentStatus::NotRequired)
    }

    pub fn is_paid(self) -> bool {
        matches!(self, PaymentStatus::Paid)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProfileState {
    PendingPayment,
    Active,
    Hidden,
    ScheduledForDeletion,
    Deleted,
}

impl ProfileState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProfileState::Deleted)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatrimonyProfile {
    pub id: String,
    pub owner_id: String,
    pub details: ProfileDetails,
    pub photos: PhotoSet,
    pub payment: PaymentStatus,
    pub is_hidden: bool,
    pub scheduled_deletion: Option<DateTime<Utc>>,
    pub deleted: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl MatrimonyProfile {
    pub fn state(&self) -> ProfileState {
        if self.deleted {
            ProfileState::Deleted
        } else if self.scheduled_deletion.is_some() {
            ProfileState::ScheduledForDeletion
        } else if self.payment == PaymentStatus::Pending {
            ProfileState::PendingPayment
        } else if self.is_hidden {
            ProfileState::Hidden
        } else {
            ProfileState::Active
        }
    }

    pub fn payment_required(&self) -> bool {
        self.payment.payment_required()
    }

    pub fn is_paid(&self) -> bool {
        self.payment.is_paid()
    }

    pub fn is_publicly_listed(&self) -> bool {
        !self.deleted
            && !self.is_hidden
            && (self.is_paid() || !self.payment_required())
    }
}

impl From<ProfileRecord> for MatrimonyProfile {
    fn from(record: ProfileRecord) -> Self {
        if record.is_hidden && record.payment_required && !record.is_paid {
            tracing::warn!(profile_id = %record.id, "profile hidden while payment is pending");
        }
        Self {
            id: record.id,
            owner_id: record.owner_id,
            details: record.details,
            photos: PhotoSet::normalized(record.photos),
            payment: PaymentStatus::from_flags(record.payment_required, record.is_paid),
            is_hidden: record.is_hidden,
            scheduled_deletion: record.scheduled_deletion,
            deleted: false,
            created_at: record.created_at,
        }
    }
}

/// Owner or admin edit. Payment flags are deliberately absent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height_cm: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marital_status: Option<MaritalStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub education: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diet: Option<Diet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner_expectations: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photos: Option<Vec<Photo>>,
}

impl ProfileChanges {
    pub fn apply_to(&self, details: &mut ProfileDetails) {
        if let Some(value) = &self.full_name {
            details.full_name = value.clone();
        }
        if let Some(value) = self.date_of_birth {
            details.date_of_birth = value;
        }
        if let Some(value) = self.gender {
            details.gender = value;
        }
        if let Some(value) = self.height_cm {
            details.height_cm = value;
        }
        if let Some(value) = self.marital_status {
            details.marital_status = value;
        }
        let optional = [
            (&self.education, &mut details.education),
            (&self.occupation, &mut details.occupation),
            (&self.city, &mut details.city),
            (&self.contact_email, &mut details.contact_email),
            (&self.contact_phone, &mut details.contact_phone),
            (&self.about, &mut details.about),
            (&self.family_details, &mut details.family_details),
            (&self.partner_expectations, &mut details.partner_expectations),
        ];
        for (change, field) in optional {
            if let Some(value) = change {
                *field = Some(value.clone());
            }
        }
        if let Some(value) = self.diet {
            details.diet = Some(value);
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct ProfileFilter {
    pub gender: Option<Gender>,
    pub min_age: Option<u32>,
    pub max_age: Option<u32>,
    pub education: Option<String>,
    pub occupation: Option<String>,
    pub diet: Option<Diet>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ProfileFilter {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(gender) = self.gender {
            pairs.push((
                "gender",
                match gender {
                    Gender::Male => "male".to_string(),
                    Gender::Female => "female".to_string(),
                },
            ));
        }
        if let Some(value) = self.min_age {
            pairs.push(("minAge", value.to_string()));
        }
        if let Some(value) = self.max_age {
            pairs.push(("maxAge", value.to_string()));
        }
        if let Some(value) = &self.education {
            pairs.push(("education", value.clone()));
        }
        if let Some(value) = &self.occupation {
            pairs.push(("occupation", value.clone()));
        }
        if let Some(diet) = self.diet {
            let value = serde_json::to_value(diet)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            pairs.push(("diet", value));
        }
        pairs.push(("page", self.page.unwrap_or(1).to_string()));
        pairs.push(("limit", self.limit.unwrap_or(12).min(50).to_string()));
        pairs
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePage<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub total_pages: u32,
    pub total: u64,
}

#[cfg(test)]
pub(crate) fn fixture(id: &str, owner_id: &str, payment: PaymentStatus) -> MatrimonyProfile {
    MatrimonyProfile {
        id: id.to_string(),
        owner_id: owner_id.to_string(),
        details: ProfileDetails {
            full_name: "Meera Nair".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1996, 4, 12).expect("date"),
            gender: Gender::Female,
            height_cm: 162,
            marital_status: MaritalStatus::NeverMarried,
            education: Some("MSc".to_string()),
            occupation: None,
            diet: Some(Diet::Vegetarian),
            city: None,
            contact_email: Some("meera@example.org".to_string()),
            contact_phone: None,
            about: None,
            family_details: None,
            partner_expectations: None,
        },
        photos: PhotoSet::normalized(vec![Photo {
            url: "https://media.example.org/p1.jpg".to_string(),
            storage_id: "p1".to_string(),
            is_primary: true,
        }]),
        payment,
        is_hidden: false,
        scheduled_deletion: None,
        deleted: false,
        created_at: None,
    }
}
