//! Filename-based classification of uploaded artifacts.
//!
//! Classification is heuristic: filenames are matched case-insensitively
//! against an ordered rule table and the FIRST rule with any matching keyword
//! wins. Order matters where keyword sets overlap (a file named
//! "avatar-garant.pdf" matches both the avatar and the guarantor rule and is
//! classified as an avatar; "photo-profil.jpg" matches the avatar rule before
//! the profile-photo rule ever sees it).

/// Destination bucket, decided by declared content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Documents,
    Avatars,
}

const PDF_CONTENT_TYPE: &str = "application/pdf";

/// PDFs are documents, images are avatars, everything else is unsupported.
pub fn bucket_for(content_type: &str) -> Option<Bucket> {
    if content_type == PDF_CONTENT_TYPE {
        Some(Bucket::Documents)
    } else if content_type.starts_with("image/") {
        Some(Bucket::Avatars)
    } else {
        None
    }
}

pub struct Rule {
    pub keywords: &'static [&'static str],
    pub field: &'static str,
}

/// Ordered rule table mapping filename keywords to profile fields. French and
/// English keywords both match because clients name files either way.
pub const RULES: &[Rule] = &[
    Rule {
        keywords: &["avatar", "photo-profil"],
        field: "avatar_url",
    },
    Rule {
        keywords: &["profile", "profil"],
        field: "profile_photo_url",
    },
    Rule {
        keywords: &["id", "identite", "cni"],
        field: "id_document_url",
    },
    Rule {
        keywords: &["emploi", "travail", "work"],
        field: "employment_certificate_url",
    },
    Rule {
        keywords: &["salaire", "bulletin", "salary"],
        field: "salary_slips_urls",
    },
    Rule {
        keywords: &["loyer", "rental"],
        field: "rental_attestation_url",
    },
    Rule {
        keywords: &["dette", "debt"],
        field: "debt_certificate_url",
    },
    Rule {
        keywords: &["permit", "sejour"],
        field: "residence_permit_url",
    },
    Rule {
        keywords: &["garant", "guarantor"],
        field: "guarantor_documents_urls",
    },
];

/// First-match lookup; `None` means the file's URL is discarded, which is
/// best-effort classification, not an error.
pub fn field_for_filename(filename: &str) -> Option<&'static str> {
    let name = filename.to_lowercase();
    RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|kw| name.contains(kw)))
        .map(|rule| rule.field)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_goes_to_documents_images_to_avatars() {
        assert_eq!(bucket_for("application/pdf"), Some(Bucket::Documents));
        assert_eq!(bucket_for("image/jpeg"), Some(Bucket::Avatars));
        assert_eq!(bucket_for("image/png"), Some(Bucket::Avatars));
        assert_eq!(bucket_for("application/zip"), None);
        assert_eq!(bucket_for("text/plain"), None);
        // Prefix match only, no exotic variants.
        assert_eq!(bucket_for("application/pdf;charset=x"), None);
    }

    #[test]
    fn every_rule_matches_each_of_its_keywords() {
        for rule in RULES {
            for kw in rule.keywords {
                let filename = format!("{kw}-2024.pdf");
                assert_eq!(
                    field_for_filename(&filename),
                    Some(rule.field),
                    "keyword {kw}"
                );
            }
        }
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(field_for_filename("CNI-Jean.PDF"), Some("id_document_url"));
        assert_eq!(field_for_filename("Avatar.JPG"), Some("avatar_url"));
    }

    #[test]
    fn first_rule_wins_on_overlap() {
        // Matches both avatar (rule 1) and guarantor (rule 9).
        assert_eq!(field_for_filename("avatar-garant.pdf"), Some("avatar_url"));
        // "photo-profil" is caught by the avatar rule before the profile rule.
        assert_eq!(field_for_filename("photo-profil.jpg"), Some("avatar_url"));
        // Plain "profil" falls through to the profile-photo rule.
        assert_eq!(
            field_for_filename("mon-profil.jpg"),
            Some("profile_photo_url")
        );
    }

    #[test]
    fn unmatched_filenames_classify_to_nothing() {
        assert_eq!(field_for_filename("vacances-2023.pdf"), None);
        assert_eq!(field_for_filename("scan.pdf"), None);
    }

    #[test]
    fn classification_is_deterministic() {
        for _ in 0..3 {
            assert_eq!(
                field_for_filename("bulletin-mars.pdf"),
                Some("salary_slips_urls")
            );
        }
    }
}
