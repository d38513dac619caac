//! Structural validation of backend payloads.
//!
//! Every function here takes untyped JSON and either returns the typed model or a
//! [`SchemaViolation`] naming the first offending field by path
//! (e.g. `resumeAnalysis.sections[0].points[2].technical_score`). There is no partial
//! acceptance: one bad field rejects the whole payload.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::analysis::schema::{
    AnalysisResult, EducationPoint, ExperienceMatch, GeneralPoint, JobMatchAnalysis,
    KeyRequirements, PointRewrite, Reputation, ResumeAnalysis, Section, SectionKind,
    SectionPoints, SectionRecommendations, Star, TechnicalMatch, TokenUsage,
};

const MIN_RATIONALE_CHARS: usize = 10;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{path}: {reason}")]
pub struct SchemaViolation {
    pub path: String,
    pub reason: String,
}

impl SchemaViolation {
    pub(crate) fn new(path: &str, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

type Checked<T> = Result<T, SchemaViolation>;

// ────────────────────────────────────────────────────────────────────────────
// Entry points
// ────────────────────────────────────────────────────────────────────────────

/// Validates a complete top-level response (`status`, `resumeAnalysis`, `tokenUsage`,
/// optional `jobMatchAnalysis`). Only `success` payloads validate; error results carry
/// nothing to check and are never cached.
pub fn validate_analysis_response(raw: &Value) -> Checked<AnalysisResult> {
    let obj = object(raw, "$")?;

    let status = string(required(obj, "", "status")?, "status")?;
    if status != "success" {
        return Err(SchemaViolation::new(
            "status",
            format!("must be \"success\", got \"{status}\""),
        ));
    }

    let resume_analysis = resume_analysis_at(required(obj, "", "resumeAnalysis")?, "resumeAnalysis")?;
    let token_usage = token_usage_at(required(obj, "", "tokenUsage")?, "tokenUsage")?;
    let job_match_analysis = match obj.get("jobMatchAnalysis") {
        None | Some(Value::Null) => None,
        Some(v) => Some(job_match_at(v, "jobMatchAnalysis")?),
    };

    Ok(AnalysisResult::success(
        resume_analysis,
        job_match_analysis,
        token_usage,
    ))
}

/// Validates the resume-analysis portion (`{"sections": [...]}`) and derives its scores and
/// recommendations.
pub fn validate_resume_analysis(raw: &Value) -> Checked<ResumeAnalysis> {
    resume_analysis_at(raw, "resumeAnalysis")
}

/// Validates the job-match portion.
pub fn validate_job_match(raw: &Value) -> Checked<JobMatchAnalysis> {
    job_match_at(raw, "jobMatchAnalysis")
}

// ────────────────────────────────────────────────────────────────────────────
// Resume analysis
// ────────────────────────────────────────────────────────────────────────────

fn resume_analysis_at(raw: &Value, path: &str) -> Checked<ResumeAnalysis> {
    let obj = object(raw, path)?;
    let sections_path = join(path, "sections");
    let sections = array(required(obj, path, "sections")?, &sections_path)?
        .iter()
        .enumerate()
        .map(|(i, s)| section_at(s, &format!("{sections_path}[{i}]")))
        .collect::<Checked<Vec<_>>>()?;

    Ok(ResumeAnalysis::from_sections(sections))
}

fn section_at(raw: &Value, path: &str) -> Checked<Section> {
    let obj = object(raw, path)?;
    let section_type = string(required(obj, path, "type")?, &join(path, "type"))?;

    let points_path = join(path, "points");
    let raw_points = array(required(obj, path, "points")?, &points_path)?;
    let point_path = |i: usize| format!("{points_path}[{i}]");

    let points = match SectionKind::classify(&section_type) {
        SectionKind::Education => SectionPoints::Education(
            raw_points
                .iter()
                .enumerate()
                .map(|(i, p)| education_point_at(p, &point_path(i)))
                .collect::<Checked<_>>()?,
        ),
        SectionKind::General => SectionPoints::General(
            raw_points
                .iter()
                .enumerate()
                .map(|(i, p)| general_point_at(p, &point_path(i)))
                .collect::<Checked<_>>()?,
        ),
    };

    Ok(Section {
        section_type,
        points,
    })
}

fn general_point_at(raw: &Value, path: &str) -> Checked<GeneralPoint> {
    let obj = object(raw, path)?;
    Ok(GeneralPoint {
        text: non_empty_string(required(obj, path, "text")?, &join(path, "text"))?,
        star: star_at(required(obj, path, "star")?, &join(path, "star"))?,
        metrics: string_list(required(obj, path, "metrics")?, &join(path, "metrics"))?,
        technical_score: number_in(
            required(obj, path, "technical_score")?,
            &join(path, "technical_score"),
            0.0,
            5.0,
        )?,
        improvement: string(required(obj, path, "improvement")?, &join(path, "improvement"))?,
    })
}

fn star_at(raw: &Value, path: &str) -> Checked<Star> {
    let obj = object(raw, path)?;
    let flag = |name: &str| boolean(required(obj, path, name)?, &join(path, name));
    let why = |name: &str| rationale(required(obj, path, name)?, &join(path, name));

    let situation = flag("situation")?;
    let action = flag("action")?;
    let result = flag("result")?;
    let claimed_complete = flag("complete")?;

    if claimed_complete {
        let missing: Vec<&str> = [("situation", situation), ("action", action), ("result", result)]
            .into_iter()
            .filter(|(_, present)| !present)
            .map(|(name, _)| name)
            .collect();
        if !missing.is_empty() {
            return Err(SchemaViolation::new(
                &join(path, "complete"),
                format!("is true but {} is false", missing.join(", ")),
            ));
        }
    }

    Ok(Star {
        situation,
        situation_rationale: why("situation_rationale")?,
        action,
        action_rationale: why("action_rationale")?,
        result,
        result_rationale: why("result_rationale")?,
        complete: situation && action && result,
    })
}

fn education_point_at(raw: &Value, path: &str) -> Checked<EducationPoint> {
    let obj = object(raw, path)?;
    let text = |name: &str| non_empty_string(required(obj, path, name)?, &join(path, name));

    let rep_path = join(path, "subject_course_school_reputation");
    let rep = object(
        required(obj, path, "subject_course_school_reputation")?,
        &rep_path,
    )?;
    let score = |name: &str| {
        integer_in(required(rep, &rep_path, name)?, &join(&rep_path, name), 0, 10).map(|n| n as u8)
    };
    let why = |name: &str| rationale(required(rep, &rep_path, name)?, &join(&rep_path, name));

    Ok(EducationPoint {
        text: text("text")?,
        subject: text("subject")?,
        course: text("course")?,
        school: text("school")?,
        subject_course_school_reputation: Reputation {
            domestic_score: score("domestic_score")?,
            domestic_score_rationale: why("domestic_score_rationale")?,
            international_score: score("international_score")?,
            international_score_rationale: why("international_score_rationale")?,
        },
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Job match and usage
// ────────────────────────────────────────────────────────────────────────────

fn job_match_at(raw: &Value, path: &str) -> Checked<JobMatchAnalysis> {
    let obj = object(raw, path)?;
    let percent = |o: &Map<String, Value>, parent: &str, name: &str| {
        number_in(required(o, parent, name)?, &join(parent, name), 0.0, 100.0)
    };
    let list = |o: &Map<String, Value>, parent: &str, name: &str| {
        string_list(required(o, parent, name)?, &join(parent, name))
    };
    let years = |o: &Map<String, Value>, parent: &str, name: &str| {
        integer_in(required(o, parent, name)?, &join(parent, name), 0, i64::from(u32::MAX))
            .map(|n| n as u32)
    };

    let tm_path = join(path, "technical_match");
    let tm = object(required(obj, path, "technical_match")?, &tm_path)?;
    let em_path = join(path, "experience_match");
    let em = object(required(obj, path, "experience_match")?, &em_path)?;
    let kr_path = join(path, "key_requirements");
    let kr = object(required(obj, path, "key_requirements")?, &kr_path)?;

    let section_recommendations = match obj.get("section_recommendations") {
        None | Some(Value::Null) => None,
        Some(v) => Some(section_recommendations_at(
            v,
            &join(path, "section_recommendations"),
        )?),
    };

    Ok(JobMatchAnalysis {
        match_score: percent(obj, path, "match_score")?,
        technical_match: TechnicalMatch {
            matched_skills: list(tm, &tm_path, "matched_skills")?,
            missing_skills: list(tm, &tm_path, "missing_skills")?,
            skill_coverage_score: percent(tm, &tm_path, "skill_coverage_score")?,
        },
        experience_match: ExperienceMatch {
            required_years: years(em, &em_path, "required_years")?,
            actual_years: years(em, &em_path, "actual_years")?,
            experience_score: percent(em, &em_path, "experience_score")?,
        },
        key_requirements: KeyRequirements {
            met: list(kr, &kr_path, "met")?,
            partially_met: list(kr, &kr_path, "partially_met")?,
            not_met: list(kr, &kr_path, "not_met")?,
        },
        section_recommendations,
        recommendations: list(obj, path, "recommendations")?,
    })
}

fn section_recommendations_at(raw: &Value, path: &str) -> Checked<SectionRecommendations> {
    let obj = object(raw, path)?;
    let rewrites_path = join(path, "experience_projects");
    let experience_projects = array(required(obj, path, "experience_projects")?, &rewrites_path)?
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let item_path = format!("{rewrites_path}[{i}]");
            let item = object(r, &item_path)?;
            Ok(PointRewrite {
                original_point: string(
                    required(item, &item_path, "original_point")?,
                    &join(&item_path, "original_point"),
                )?,
                improved_version: string(
                    required(item, &item_path, "improved_version")?,
                    &join(&item_path, "improved_version"),
                )?,
            })
        })
        .collect::<Checked<Vec<_>>>()?;

    Ok(SectionRecommendations {
        experience_projects,
        education: string(required(obj, path, "education")?, &join(path, "education"))?,
        skills_certs: string(required(obj, path, "skills_certs")?, &join(path, "skills_certs"))?,
    })
}

fn token_usage_at(raw: &Value, path: &str) -> Checked<TokenUsage> {
    let obj = object(raw, path)?;
    let count = |name: &str| {
        integer_in(required(obj, path, name)?, &join(path, name), 0, i64::MAX).map(|n| n as u64)
    };
    Ok(TokenUsage {
        total_tokens: count("total_tokens")?,
        prompt_tokens: count("prompt_tokens")?,
        completion_tokens: count("completion_tokens")?,
        total_cost: number_in(
            required(obj, path, "total_cost")?,
            &join(path, "total_cost"),
            0.0,
            f64::MAX,
        )?,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Primitive checks
// ────────────────────────────────────────────────────────────────────────────

fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}.{name}")
    }
}

fn required<'a>(obj: &'a Map<String, Value>, parent: &str, name: &str) -> Checked<&'a Value> {
    match obj.get(name) {
        Some(Value::Null) | None => Err(SchemaViolation::new(
            &join(parent, name),
            "required field is missing",
        )),
        Some(v) => Ok(v),
    }
}

fn object<'a>(v: &'a Value, path: &str) -> Checked<&'a Map<String, Value>> {
    v.as_object()
        .ok_or_else(|| SchemaViolation::new(path, "must be an object"))
}

fn array<'a>(v: &'a Value, path: &str) -> Checked<&'a Vec<Value>> {
    v.as_array()
        .ok_or_else(|| SchemaViolation::new(path, "must be an array"))
}

fn string(v: &Value, path: &str) -> Checked<String> {
    v.as_str()
        .map(str::to_string)
        .ok_or_else(|| SchemaViolation::new(path, "must be a string"))
}

fn non_empty_string(v: &Value, path: &str) -> Checked<String> {
    let s = string(v, path)?;
    if s.trim().is_empty() {
        return Err(SchemaViolation::new(path, "must be a non-empty string"));
    }
    Ok(s)
}

fn rationale(v: &Value, path: &str) -> Checked<String> {
    let s = string(v, path)?;
    if s.chars().count() < MIN_RATIONALE_CHARS {
        return Err(SchemaViolation::new(
            path,
            format!("must be at least {MIN_RATIONALE_CHARS} characters"),
        ));
    }
    Ok(s)
}

fn boolean(v: &Value, path: &str) -> Checked<bool> {
    v.as_bool()
        .ok_or_else(|| SchemaViolation::new(path, "must be a boolean"))
}

fn string_list(v: &Value, path: &str) -> Checked<Vec<String>> {
    array(v, path)?
        .iter()
        .enumerate()
        .map(|(i, item)| string(item, &format!("{path}[{i}]")))
        .collect()
}

fn number_in(v: &Value, path: &str, min: f64, max: f64) -> Checked<f64> {
    let n = v
        .as_f64()
        .ok_or_else(|| SchemaViolation::new(path, "must be a number"))?;
    if n < min || n > max {
        return Err(SchemaViolation::new(
            path,
            format!("must be between {min} and {max}, got {n}"),
        ));
    }
    Ok(n)
}

/// Accepts integral floats such as `8.0`, which models emit for integer fields.
fn integer_in(v: &Value, path: &str, min: i64, max: i64) -> Checked<i64> {
    let n = v
        .as_i64()
        .or_else(|| {
            v.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f as i64)
        })
        .ok_or_else(|| SchemaViolation::new(path, "must be an integer"))?;
    if n < min || n > max {
        return Err(SchemaViolation::new(
            path,
            format!("must be between {min} and {max}, got {n}"),
        ));
    }
    Ok(n)
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use serde_json::json;

    fn violation_path(result: Checked<ResumeAnalysis>) -> String {
        result.expect_err("payload should be rejected").path
    }

    #[test]
    fn test_valid_resume_payload_passes() {
        let analysis = validate_resume_analysis(&resume_payload()).unwrap();
        assert_eq!(analysis.sections.len(), 2);
        assert!(matches!(analysis.sections[0].points, SectionPoints::General(ref p) if p.len() == 1));
        assert!(matches!(analysis.sections[1].points, SectionPoints::Education(ref p) if p.len() == 1));
        assert_eq!(analysis.scores.star_score, 5.0);
        assert_eq!(analysis.scores.technical_score, 4.5);
        // Only the skills section is missing from the fixture
        assert_eq!(analysis.recommendations.len(), 1);
        assert_eq!(analysis.recommendations[0].section, "SKILLS");
    }

    #[test]
    fn test_complete_claim_with_missing_situation_is_rejected() {
        let mut payload = resume_payload();
        payload["sections"][0]["points"][0]["star"] = star(false, true, true, true);

        let err = validate_resume_analysis(&payload).unwrap_err();
        assert_eq!(
            err.path,
            "resumeAnalysis.sections[0].points[0].star.complete"
        );
        assert!(err.reason.contains("situation"));
    }

    #[test]
    fn test_complete_false_is_normalized_when_all_components_present() {
        let mut payload = resume_payload();
        payload["sections"][0]["points"][0]["star"] = star(true, true, true, false);

        let analysis = validate_resume_analysis(&payload).unwrap();
        let SectionPoints::General(points) = &analysis.sections[0].points else {
            panic!("expected general points");
        };
        assert!(points[0].star.complete);
    }

    #[test]
    fn test_missing_technical_score_is_rejected() {
        let mut payload = resume_payload();
        payload["sections"][0]["points"][0]
            .as_object_mut()
            .unwrap()
            .remove("technical_score");
        assert_eq!(
            violation_path(validate_resume_analysis(&payload)),
            "resumeAnalysis.sections[0].points[0].technical_score"
        );
    }

    #[test]
    fn test_technical_score_out_of_range_is_rejected() {
        let mut payload = resume_payload();
        payload["sections"][0]["points"][0]["technical_score"] = json!(5.5);
        let err = validate_resume_analysis(&payload).unwrap_err();
        assert!(err.reason.contains("between 0 and 5"));
    }

    #[test]
    fn test_technical_score_must_be_numeric() {
        let mut payload = resume_payload();
        payload["sections"][0]["points"][0]["technical_score"] = json!("4");
        let err = validate_resume_analysis(&payload).unwrap_err();
        assert_eq!(err.reason, "must be a number");
    }

    #[test]
    fn test_short_rationale_is_rejected() {
        let mut payload = resume_payload();
        payload["sections"][0]["points"][0]["star"]["action_rationale"] = json!("too short");
        assert_eq!(
            violation_path(validate_resume_analysis(&payload)),
            "resumeAnalysis.sections[0].points[0].star.action_rationale"
        );
    }

    #[test]
    fn test_blank_point_text_is_rejected() {
        let mut payload = resume_payload();
        payload["sections"][0]["points"][0]["text"] = json!("   ");
        let err = validate_resume_analysis(&payload).unwrap_err();
        assert_eq!(err.reason, "must be a non-empty string");
    }

    #[test]
    fn test_metrics_must_be_strings() {
        let mut payload = resume_payload();
        payload["sections"][0]["points"][0]["metrics"] = json!(["40%", 12]);
        assert_eq!(
            violation_path(validate_resume_analysis(&payload)),
            "resumeAnalysis.sections[0].points[0].metrics[1]"
        );
    }

    #[test]
    fn test_empty_metrics_are_allowed() {
        let mut payload = resume_payload();
        payload["sections"][0]["points"][0]["metrics"] = json!([]);
        assert!(validate_resume_analysis(&payload).is_ok());
    }

    #[test]
    fn test_education_score_out_of_range_is_rejected() {
        let mut payload = resume_payload();
        payload["sections"][1]["points"][0]["subject_course_school_reputation"]["domestic_score"] =
            json!(11);
        assert_eq!(
            violation_path(validate_resume_analysis(&payload)),
            "resumeAnalysis.sections[1].points[0].subject_course_school_reputation.domestic_score"
        );
    }

    #[test]
    fn test_education_score_must_be_integral() {
        let mut payload = resume_payload();
        let rep = &mut payload["sections"][1]["points"][0]["subject_course_school_reputation"];
        rep["international_score"] = json!(7.5);
        assert!(validate_resume_analysis(&payload).is_err());

        let mut payload = resume_payload();
        payload["sections"][1]["points"][0]["subject_course_school_reputation"]
            ["international_score"] = json!(7.0);
        assert!(validate_resume_analysis(&payload).is_ok());
    }

    #[test]
    fn test_education_point_missing_school_is_rejected() {
        let mut payload = resume_payload();
        payload["sections"][1]["points"][0]
            .as_object_mut()
            .unwrap()
            .remove("school");
        assert_eq!(
            violation_path(validate_resume_analysis(&payload)),
            "resumeAnalysis.sections[1].points[0].school"
        );
    }

    #[test]
    fn test_education_section_with_star_points_is_rejected() {
        let payload = json!({
            "sections": [{"type": "education", "points": [general_point()]}]
        });
        assert!(validate_resume_analysis(&payload).is_err());
    }

    #[test]
    fn test_missing_sections_is_rejected() {
        let err = validate_resume_analysis(&json!({})).unwrap_err();
        assert_eq!(err.path, "resumeAnalysis.sections");
        assert_eq!(err.reason, "required field is missing");
    }

    #[test]
    fn test_section_without_points_is_rejected() {
        let payload = json!({"sections": [{"type": "Skills"}]});
        assert_eq!(
            violation_path(validate_resume_analysis(&payload)),
            "resumeAnalysis.sections[0].points"
        );
    }

    #[test]
    fn test_valid_job_match_passes() {
        let analysis = validate_job_match(&job_match_payload()).unwrap();
        assert_eq!(analysis.match_score, 72.0);
        assert_eq!(analysis.experience_match.required_years, 5);
        assert!(analysis.section_recommendations.is_none());
    }

    #[test]
    fn test_job_match_score_out_of_range_is_rejected() {
        let mut payload = job_match_payload();
        payload["match_score"] = json!(101);
        let err = validate_job_match(&payload).unwrap_err();
        assert_eq!(err.path, "jobMatchAnalysis.match_score");
    }

    #[test]
    fn test_job_match_negative_years_are_rejected() {
        let mut payload = job_match_payload();
        payload["experience_match"]["actual_years"] = json!(-1);
        let err = validate_job_match(&payload).unwrap_err();
        assert_eq!(err.path, "jobMatchAnalysis.experience_match.actual_years");
    }

    #[test]
    fn test_job_match_missing_key_requirement_list_is_rejected() {
        let mut payload = job_match_payload();
        payload["key_requirements"]
            .as_object_mut()
            .unwrap()
            .remove("partially_met");
        let err = validate_job_match(&payload).unwrap_err();
        assert_eq!(err.path, "jobMatchAnalysis.key_requirements.partially_met");
    }

    #[test]
    fn test_job_match_section_recommendations_are_checked_when_present() {
        let mut payload = job_match_payload();
        payload["section_recommendations"] = json!({
            "experience_projects": [
                {"original_point": "Built APIs", "improved_version": "Built 12 REST APIs serving 2M req/day"}
            ],
            "education": "List distributed systems coursework",
            "skills_certs": "Group cloud skills together"
        });
        let analysis = validate_job_match(&payload).unwrap();
        assert_eq!(
            analysis.section_recommendations.unwrap().experience_projects.len(),
            1
        );

        payload["section_recommendations"]["experience_projects"][0]
            .as_object_mut()
            .unwrap()
            .remove("improved_version");
        assert!(validate_job_match(&payload).is_err());
    }

    #[test]
    fn test_full_response_validates() {
        let raw = json!({
            "status": "success",
            "resumeAnalysis": resume_payload(),
            "jobMatchAnalysis": job_match_payload(),
            "tokenUsage": {
                "total_tokens": 1500,
                "prompt_tokens": 1000,
                "completion_tokens": 500,
                "total_cost": 0.025
            }
        });
        let result = validate_analysis_response(&raw).unwrap();
        assert!(result.is_success());
        assert!(result.job_match_analysis.is_some());
        assert_eq!(result.token_usage.total_tokens, 1500);
    }

    #[test]
    fn test_full_response_rejects_negative_token_counts() {
        let raw = json!({
            "status": "success",
            "resumeAnalysis": resume_payload(),
            "tokenUsage": {
                "total_tokens": -1,
                "prompt_tokens": 0,
                "completion_tokens": 0,
                "total_cost": 0
            }
        });
        let err = validate_analysis_response(&raw).unwrap_err();
        assert_eq!(err.path, "tokenUsage.total_tokens");
    }

    #[test]
    fn test_full_response_requires_success_status() {
        let raw = json!({
            "status": "error",
            "resumeAnalysis": resume_payload(),
            "tokenUsage": {"total_tokens": 0, "prompt_tokens": 0, "completion_tokens": 0, "total_cost": 0}
        });
        assert_eq!(validate_analysis_response(&raw).unwrap_err().path, "status");
    }

    #[test]
    fn test_violation_message_names_field_and_constraint() {
        let err = SchemaViolation::new("a.b", "must be a string");
        assert_eq!(err.to_string(), "a.b: must be a string");
    }
}
