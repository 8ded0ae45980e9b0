use serde::{Deserialize, Serialize};

use super::domain::{
    Candidate, CandidateId, CandidateResponse, Employer, ExperienceLevel, Introduction,
    IntroductionStatus,
};

/// Slice of a candidate profile an employer is entitled to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileAccess {
    NoAgreement,
    AgreementSigned,
    FullAccess,
}

impl ProfileAccess {
    pub const fn label(self) -> &'static str {
        match self {
            Self::NoAgreement => "no_agreement",
            Self::AgreementSigned => "agreement_signed",
            Self::FullAccess => "full_access",
        }
    }
}

/// Compute the access level for one employer/candidate pairing.
///
/// No signed service agreement shuts everything off. With an agreement,
/// contact data opens up only once the introduction has actually been made
/// (or the candidate accepted the request themselves).
pub fn access_level(employer: &Employer, introduction: Option<&Introduction>) -> ProfileAccess {
    if employer.agreement_signed_at.is_none() {
        return ProfileAccess::NoAgreement;
    }

    match introduction {
        Some(intro) if grants_full_access(intro) => ProfileAccess::FullAccess,
        _ => ProfileAccess::AgreementSigned,
    }
}

fn grants_full_access(introduction: &Introduction) -> bool {
    if introduction.candidate_response == Some(CandidateResponse::Accepted) {
        return true;
    }
    matches!(
        introduction.status,
        IntroductionStatus::Introduced
            | IntroductionStatus::Interviewing
            | IntroductionStatus::OfferExtended
            | IntroductionStatus::Hired
    )
}

/// Read-time projection of a candidate record. The underlying candidate is
/// never mutated; absent fields are omitted from the serialized form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateProfileView {
    pub candidate_id: CandidateId,
    pub access: ProfileAccess,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience_level: Option<ExperienceLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_url: Option<String>,
}

/// Project a candidate down to what the access level allows.
pub fn project_candidate(candidate: &Candidate, access: ProfileAccess) -> CandidateProfileView {
    let mut view = CandidateProfileView {
        candidate_id: candidate.id.clone(),
        access,
        full_name: None,
        headline: None,
        bio: None,
        skills: None,
        experience_level: None,
        available: None,
        email: None,
        phone: None,
        links: None,
        resume_url: None,
    };

    if access == ProfileAccess::NoAgreement {
        return view;
    }

    view.full_name = Some(candidate.full_name.clone());
    view.headline = Some(candidate.headline.clone());
    view.bio = Some(candidate.bio.clone());
    view.skills = Some(candidate.skills.clone());
    view.experience_level = Some(candidate.experience_level);
    view.available = Some(candidate.available);

    if access == ProfileAccess::FullAccess {
        view.email = Some(candidate.email.clone());
        view.phone = candidate.phone.clone();
        view.links = Some(candidate.links.clone());
        view.resume_url = candidate.resume_url.clone();
    }

    view
}
