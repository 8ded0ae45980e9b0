use super::common::{candidate, employer, introduction, unsigned_employer};
use crate::pipeline::access::{access_level, project_candidate, ProfileAccess};
use crate::pipeline::domain::{CandidateResponse, IntroductionStatus};

#[test]
fn no_agreement_shuts_everything_off() {
    let level = access_level(&unsigned_employer(), Some(&introduction()));
    assert_eq!(level, ProfileAccess::NoAgreement);

    let view = project_candidate(&candidate(), level);
    let json = serde_json::to_value(&view).expect("view serializes");
    let object = json.as_object().expect("object");

    // Nothing but the id and the access marker survives the projection.
    assert_eq!(object.len(), 2);
    assert!(object.contains_key("candidate_id"));
    assert!(object.contains_key("access"));
    assert!(!object.contains_key("skills"));
    assert!(!object.contains_key("bio"));
    assert!(!object.contains_key("email"));
}

#[test]
fn agreement_without_introduction_strips_contact_fields() {
    let level = access_level(&employer(), None);
    assert_eq!(level, ProfileAccess::AgreementSigned);

    let view = project_candidate(&candidate(), level);
    assert!(view.skills.is_some());
    assert!(view.bio.is_some());
    assert!(view.experience_level.is_some());
    assert!(view.email.is_none());
    assert!(view.phone.is_none());
    assert!(view.links.is_none());
    assert!(view.resume_url.is_none());
}

#[test]
fn early_introduction_stages_stay_at_agreement_level() {
    for status in [
        IntroductionStatus::ProfileViewed,
        IntroductionStatus::IntroRequested,
        IntroductionStatus::CandidateDeclined,
        IntroductionStatus::Expired,
        IntroductionStatus::ClosedNoHire,
    ] {
        let mut intro = introduction();
        intro.status = status;
        assert_eq!(
            access_level(&employer(), Some(&intro)),
            ProfileAccess::AgreementSigned,
            "status {status:?}"
        );
    }
}

#[test]
fn introduced_and_later_stages_grant_full_access() {
    for status in [
        IntroductionStatus::Introduced,
        IntroductionStatus::Interviewing,
        IntroductionStatus::OfferExtended,
        IntroductionStatus::Hired,
    ] {
        let mut intro = introduction();
        intro.status = status;
        assert_eq!(
            access_level(&employer(), Some(&intro)),
            ProfileAccess::FullAccess,
            "status {status:?}"
        );
    }
}

#[test]
fn candidate_acceptance_grants_full_access_before_introduction() {
    let mut intro = introduction();
    intro.status = IntroductionStatus::IntroRequested;
    intro.candidate_response = Some(CandidateResponse::Accepted);

    assert_eq!(
        access_level(&employer(), Some(&intro)),
        ProfileAccess::FullAccess
    );
}

#[test]
fn full_access_exposes_contact_without_touching_the_record() {
    let source = candidate();
    let view = project_candidate(&source, ProfileAccess::FullAccess);

    assert_eq!(view.email.as_deref(), Some("ada@example.com"));
    assert!(view.phone.is_some());
    assert!(view.resume_url.is_some());
    // Projection is read-only; the source is untouched.
    assert_eq!(source, candidate());
}
