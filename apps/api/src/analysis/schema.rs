//! Typed model of an analysis result.
//!
//! Values of these types only come into existence through `analysis::validation`, cache hits
//! included. Field names on the wire match the function-calling schema the backend is asked to
//! fill.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

// ────────────────────────────────────────────────────────────────────────────
// Resume analysis
// ────────────────────────────────────────────────────────────────────────────

/// Which point shape a section carries, decided by its free-text label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Education,
    General,
}

impl SectionKind {
    pub fn classify(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case("education") {
            SectionKind::Education
        } else {
            SectionKind::General
        }
    }
}

/// One STAR assessment. `complete` always equals `situation && action && result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Star {
    pub situation: bool,
    pub situation_rationale: String,
    pub action: bool,
    pub action_rationale: String,
    pub result: bool,
    pub result_rationale: String,
    pub complete: bool,
}

/// A bullet from an experience/projects/skills-style section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralPoint {
    pub text: String,
    pub star: Star,
    pub metrics: Vec<String>,
    /// 0.0 – 5.0
    pub technical_score: f64,
    pub improvement: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reputation {
    /// 0 – 10
    pub domestic_score: u8,
    pub domestic_score_rationale: String,
    /// 0 – 10
    pub international_score: u8,
    pub international_score_rationale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EducationPoint {
    pub text: String,
    pub subject: String,
    pub course: String,
    pub school: String,
    pub subject_course_school_reputation: Reputation,
}

/// Points of one section, keyed on the section kind.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionPoints {
    General(Vec<GeneralPoint>),
    Education(Vec<EducationPoint>),
}

impl SectionPoints {
    pub fn len(&self) -> usize {
        match self {
            SectionPoints::General(points) => points.len(),
            SectionPoints::Education(points) => points.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    /// Free-text label as the backend returned it ("Experience", "Education", ...).
    pub section_type: String,
    pub points: SectionPoints,
}

#[derive(Serialize)]
struct SectionRef<'a, P: Serialize> {
    #[serde(rename = "type")]
    section_type: &'a str,
    points: &'a P,
}

impl Serialize for Section {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.points {
            SectionPoints::General(points) => SectionRef {
                section_type: &self.section_type,
                points,
            }
            .serialize(serializer),
            SectionPoints::Education(points) => SectionRef {
                section_type: &self.section_type,
                points,
            }
            .serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Section {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct RawSection {
            #[serde(rename = "type")]
            section_type: String,
            points: Value,
        }

        let raw = RawSection::deserialize(deserializer)?;
        let points = match SectionKind::classify(&raw.section_type) {
            SectionKind::Education => {
                SectionPoints::Education(serde_json::from_value(raw.points).map_err(D::Error::custom)?)
            }
            SectionKind::General => {
                SectionPoints::General(serde_json::from_value(raw.points).map_err(D::Error::custom)?)
            }
        };
        Ok(Section {
            section_type: raw.section_type,
            points,
        })
    }
}

/// Scores derived locally from the validated sections (not requested from the backend).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisScores {
    /// Share of STAR-complete points, scaled to 0 – 5.
    pub star_score: f64,
    /// Metrics cited per point × 2.5, capped at 5.
    pub metrics_score: f64,
    /// Mean technical score across general points.
    pub technical_score: f64,
}

impl AnalysisScores {
    pub fn from_sections(sections: &[Section]) -> Self {
        let points: Vec<&GeneralPoint> = sections
            .iter()
            .filter_map(|s| match &s.points {
                SectionPoints::General(points) => Some(points.iter()),
                SectionPoints::Education(_) => None,
            })
            .flatten()
            .collect();

        if points.is_empty() {
            return Self {
                star_score: 0.0,
                metrics_score: 0.0,
                technical_score: 0.0,
            };
        }

        let n = points.len() as f64;
        let complete = points.iter().filter(|p| p.star.complete).count() as f64;
        let metrics = points.iter().map(|p| p.metrics.len()).sum::<usize>() as f64;
        let technical = points.iter().map(|p| p.technical_score).sum::<f64>();

        Self {
            star_score: round1(complete / n * 5.0),
            metrics_score: round1(metrics / n * 2.5).min(5.0),
            technical_score: round1(technical / n),
        }
    }
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    MissingSection,
    General,
    StarFormat,
    Metrics,
}

/// Resume-level advice derived from the validated sections. Lower `priority` comes first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: RecommendationKind,
    pub section: String,
    pub message: String,
    pub priority: u8,
}

const KEY_SECTIONS: [(&str, &str); 3] = [
    (
        "EXPERIENCE",
        "Add a work experience section to highlight your professional background.",
    ),
    (
        "EDUCATION",
        "Include an education section to showcase your academic qualifications.",
    ),
    (
        "SKILLS",
        "Add a skills section to highlight your technical and professional competencies.",
    ),
];

impl Recommendation {
    fn new(kind: RecommendationKind, section: &str, message: String, priority: u8) -> Self {
        Self {
            kind,
            section: section.to_string(),
            message,
            priority,
        }
    }

    /// Missing key sections first, then per-section STAR and metrics advice.
    pub fn for_sections(sections: &[Section]) -> Vec<Self> {
        let mut out = Vec::new();

        for (label, message) in KEY_SECTIONS {
            let present = sections
                .iter()
                .any(|s| s.section_type.trim().eq_ignore_ascii_case(label));
            if !present {
                out.push(Self::new(
                    RecommendationKind::MissingSection,
                    label,
                    message.to_string(),
                    1,
                ));
            }
        }
        if sections.is_empty() {
            out.push(Self::new(
                RecommendationKind::General,
                "OVERALL",
                "Add detailed sections about your experience, education, and skills.".to_string(),
                1,
            ));
        }

        for section in sections {
            let SectionPoints::General(points) = &section.points else {
                continue;
            };
            if points.is_empty() {
                continue;
            }
            let label = section.section_type.trim();
            if points.iter().any(|p| !p.star.complete) {
                out.push(Self::new(
                    RecommendationKind::StarFormat,
                    label,
                    format!("Use STAR format in your {label} section to better describe your achievements."),
                    2,
                ));
            }
            if points.iter().all(|p| p.metrics.is_empty()) {
                out.push(Self::new(
                    RecommendationKind::Metrics,
                    label,
                    format!("Add quantifiable metrics in your {label} section to demonstrate impact."),
                    2,
                ));
            }
        }

        out.sort_by_key(|r| r.priority);
        out
    }
}

/// The resume-analysis portion. This is exactly what gets cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeAnalysis {
    pub sections: Vec<Section>,
    pub scores: AnalysisScores,
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
}

impl ResumeAnalysis {
    /// Derives scores and recommendations from validated sections.
    pub fn from_sections(sections: Vec<Section>) -> Self {
        let scores = AnalysisScores::from_sections(&sections);
        let recommendations = Recommendation::for_sections(&sections);
        Self {
            sections,
            scores,
            recommendations,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Job match
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalMatch {
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    /// 0 – 100
    pub skill_coverage_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceMatch {
    pub required_years: u32,
    pub actual_years: u32,
    /// 0 – 100
    pub experience_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyRequirements {
    pub met: Vec<String>,
    pub partially_met: Vec<String>,
    pub not_met: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointRewrite {
    pub original_point: String,
    pub improved_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionRecommendations {
    pub experience_projects: Vec<PointRewrite>,
    pub education: String,
    pub skills_certs: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMatchAnalysis {
    /// 0 – 100
    pub match_score: f64,
    pub technical_match: TechnicalMatch,
    pub experience_match: ExperienceMatch,
    pub key_requirements: KeyRequirements,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_recommendations: Option<SectionRecommendations>,
    pub recommendations: Vec<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Envelope
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub total_tokens: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    /// USD
    pub total_cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    EmptyInput,
    BackendFailure,
    SchemaViolation,
}

/// What the orchestrator hands back for every request, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub status: AnalysisStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_analysis: Option<ResumeAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_match_analysis: Option<JobMatchAnalysis>,
    pub token_usage: TokenUsage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
}

impl AnalysisResult {
    pub fn success(
        resume_analysis: ResumeAnalysis,
        job_match_analysis: Option<JobMatchAnalysis>,
        token_usage: TokenUsage,
    ) -> Self {
        Self {
            status: AnalysisStatus::Success,
            resume_analysis: Some(resume_analysis),
            job_match_analysis,
            token_usage,
            message: None,
            error_code: None,
        }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>, token_usage: TokenUsage) -> Self {
        Self {
            status: AnalysisStatus::Error,
            resume_analysis: None,
            job_match_analysis: None,
            token_usage,
            message: Some(message.into()),
            error_code: Some(code),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == AnalysisStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn star(complete: bool) -> Star {
        Star {
            situation: complete,
            situation_rationale: "Context of a legacy billing system".to_string(),
            action: complete,
            action_rationale: "Rewrote the ingestion path in Rust".to_string(),
            result: complete,
            result_rationale: "Cut p99 latency by forty percent".to_string(),
            complete,
        }
    }

    fn general(complete: bool, metrics: usize, technical_score: f64) -> GeneralPoint {
        GeneralPoint {
            text: "Rewrote ingestion".to_string(),
            star: star(complete),
            metrics: (0..metrics).map(|i| format!("{i}0%")).collect(),
            technical_score,
            improvement: "Name the team size".to_string(),
        }
    }

    #[test]
    fn test_section_kind_is_case_insensitive() {
        assert_eq!(SectionKind::classify("Education"), SectionKind::Education);
        assert_eq!(SectionKind::classify(" EDUCATION "), SectionKind::Education);
        assert_eq!(SectionKind::classify("Experience"), SectionKind::General);
        assert_eq!(SectionKind::classify("Education & Training"), SectionKind::General);
    }

    #[test]
    fn test_section_serializes_with_type_and_points() {
        let section = Section {
            section_type: "Experience".to_string(),
            points: SectionPoints::General(vec![general(true, 1, 4.0)]),
        };
        let value = serde_json::to_value(&section).unwrap();
        assert_eq!(value["type"], "Experience");
        assert_eq!(value["points"][0]["technical_score"], 4.0);

        let back: Section = serde_json::from_value(value).unwrap();
        assert_eq!(back, section);
    }

    #[test]
    fn test_empty_education_section_keeps_its_kind() {
        let value = json!({"type": "Education", "points": []});
        let section: Section = serde_json::from_value(value).unwrap();
        assert_eq!(section.points, SectionPoints::Education(vec![]));
    }

    #[test]
    fn test_education_section_rejects_general_points_on_decode() {
        let value = json!({
            "type": "Education",
            "points": [{"text": "x", "star": {}, "metrics": [], "technical_score": 1, "improvement": ""}]
        });
        assert!(serde_json::from_value::<Section>(value).is_err());
    }

    #[test]
    fn test_scores_from_sections() {
        let sections = vec![
            Section {
                section_type: "Experience".to_string(),
                points: SectionPoints::General(vec![general(true, 2, 4.0), general(false, 0, 3.0)]),
            },
            Section {
                section_type: "Education".to_string(),
                points: SectionPoints::Education(vec![]),
            },
        ];
        let scores = AnalysisScores::from_sections(&sections);
        assert_eq!(scores.star_score, 2.5);
        assert_eq!(scores.metrics_score, 2.5);
        assert_eq!(scores.technical_score, 3.5);
    }

    #[test]
    fn test_metrics_score_is_capped_at_five() {
        let sections = vec![Section {
            section_type: "Projects".to_string(),
            points: SectionPoints::General(vec![general(true, 6, 5.0)]),
        }];
        assert_eq!(AnalysisScores::from_sections(&sections).metrics_score, 5.0);
    }

    #[test]
    fn test_scores_without_general_points_are_zero() {
        let scores = AnalysisScores::from_sections(&[]);
        assert_eq!(scores.star_score, 0.0);
        assert_eq!(scores.technical_score, 0.0);
    }

    fn section(label: &str, points: SectionPoints) -> Section {
        Section {
            section_type: label.to_string(),
            points,
        }
    }

    #[test]
    fn test_complete_resume_gets_no_recommendations() {
        let sections = vec![
            section("Experience", SectionPoints::General(vec![general(true, 1, 4.0)])),
            section("Education", SectionPoints::Education(vec![])),
            section("Skills", SectionPoints::General(vec![general(true, 2, 3.0)])),
        ];
        assert!(Recommendation::for_sections(&sections).is_empty());
    }

    #[test]
    fn test_missing_sections_come_before_section_advice() {
        let sections = vec![section(
            "Experience",
            SectionPoints::General(vec![general(false, 0, 3.0), general(true, 0, 4.0)]),
        )];
        let recs = Recommendation::for_sections(&sections);

        let kinds: Vec<_> = recs.iter().map(|r| (r.kind, r.section.as_str())).collect();
        assert_eq!(
            kinds,
            vec![
                (RecommendationKind::MissingSection, "EDUCATION"),
                (RecommendationKind::MissingSection, "SKILLS"),
                (RecommendationKind::StarFormat, "Experience"),
                (RecommendationKind::Metrics, "Experience"),
            ]
        );
        assert_eq!(
            recs[2].message,
            "Use STAR format in your Experience section to better describe your achievements."
        );
    }

    #[test]
    fn test_one_cited_metric_satisfies_the_section() {
        let sections = vec![section(
            "Projects",
            SectionPoints::General(vec![general(true, 0, 3.0), general(true, 1, 3.0)]),
        )];
        let recs = Recommendation::for_sections(&sections);
        assert!(recs.iter().all(|r| r.kind == RecommendationKind::MissingSection));
    }

    #[test]
    fn test_empty_resume_gets_overall_advice() {
        let recs = Recommendation::for_sections(&[]);
        assert_eq!(recs.len(), 4);
        assert_eq!(recs[3].kind, RecommendationKind::General);
        assert_eq!(recs[3].section, "OVERALL");
    }

    #[test]
    fn test_recommendation_wire_shape() {
        let recs = Recommendation::for_sections(&[]);
        let value = serde_json::to_value(&recs[0]).unwrap();
        assert_eq!(value["type"], "missing_section");
        assert_eq!(value["section"], "EXPERIENCE");
        assert_eq!(value["priority"], 1);
    }

    #[test]
    fn test_cached_analysis_without_recommendations_still_decodes() {
        let value = json!({
            "sections": [],
            "scores": {"star_score": 0.0, "metrics_score": 0.0, "technical_score": 0.0}
        });
        let analysis: ResumeAnalysis = serde_json::from_value(value).unwrap();
        assert!(analysis.recommendations.is_empty());
    }

    #[test]
    fn test_error_result_wire_shape() {
        let result = AnalysisResult::error(
            ErrorCode::EmptyInput,
            "Resume text is empty",
            TokenUsage::default(),
        );
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["errorCode"], "EMPTY_INPUT");
        assert_eq!(value["message"], "Resume text is empty");
        assert_eq!(value["tokenUsage"]["total_tokens"], 0);
        assert!(value.get("resumeAnalysis").is_none());
    }
}
