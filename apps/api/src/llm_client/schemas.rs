//! Function definitions handed to the provider. These describe the same shapes that
//! `analysis::validation` enforces; the provider treats them as guidance, the validator as law.

use serde_json::{json, Value};

/// Which structured answer a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    ResumeAnalysis,
    JobMatch,
}

impl ResponseShape {
    pub fn function_name(self) -> &'static str {
        match self {
            ResponseShape::ResumeAnalysis => "analyze_resume_section",
            ResponseShape::JobMatch => "analyze_job_match",
        }
    }

    /// Stage label used in logs and error messages.
    pub fn label(self) -> &'static str {
        match self {
            ResponseShape::ResumeAnalysis => "resume analysis",
            ResponseShape::JobMatch => "job match",
        }
    }

    pub fn function_definition(self) -> Value {
        match self {
            ResponseShape::ResumeAnalysis => resume_analysis_function(),
            ResponseShape::JobMatch => job_match_function(),
        }
    }
}

fn string_list(description: &str) -> Value {
    json!({"type": "array", "items": {"type": "string"}, "description": description})
}

fn rationale(description: &str) -> Value {
    json!({"type": "string", "minLength": 10, "description": description})
}

fn star_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "situation": {"type": "boolean", "description": "Whether the point states the context"},
            "situation_rationale": rationale("Why the situation is or is not present"),
            "action": {"type": "boolean", "description": "Whether the point states what was done"},
            "action_rationale": rationale("Why the action is or is not present"),
            "result": {"type": "boolean", "description": "Whether the point states an outcome"},
            "result_rationale": rationale("Why the result is or is not present"),
            "complete": {"type": "boolean", "description": "True only if situation, action and result are all present"}
        },
        "required": [
            "situation", "situation_rationale",
            "action", "action_rationale",
            "result", "result_rationale",
            "complete"
        ]
    })
}

fn general_point_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "text": {"type": "string", "description": "Full text of the point"},
            "star": star_schema(),
            "metrics": string_list("Quantified achievements cited in the point"),
            "technical_score": {
                "type": "number",
                "minimum": 0,
                "maximum": 5,
                "description": "Technical depth, 0 to 5"
            },
            "improvement": {"type": "string", "description": "Rewritten point in STAR form with metrics"}
        },
        "required": ["text", "star", "metrics", "technical_score", "improvement"]
    })
}

fn education_point_schema() -> Value {
    let score = |scope: &str| {
        json!({
            "type": "integer",
            "minimum": 0,
            "maximum": 10,
            "description": format!("{scope} reputation of the subject, course and school, 0 to 10")
        })
    };
    json!({
        "type": "object",
        "properties": {
            "text": {"type": "string", "description": "Full text of the education entry"},
            "subject": {"type": "string", "description": "Field of study"},
            "course": {"type": "string", "description": "Degree or course name"},
            "school": {"type": "string", "description": "Institution name"},
            "subject_course_school_reputation": {
                "type": "object",
                "properties": {
                    "domestic_score": score("Domestic"),
                    "domestic_score_rationale": rationale("Basis for the domestic score"),
                    "international_score": score("International"),
                    "international_score_rationale": rationale("Basis for the international score")
                },
                "required": [
                    "domestic_score", "domestic_score_rationale",
                    "international_score", "international_score_rationale"
                ]
            }
        },
        "required": ["text", "subject", "course", "school", "subject_course_school_reputation"]
    })
}

fn resume_analysis_function() -> Value {
    json!({
        "name": ResponseShape::ResumeAnalysis.function_name(),
        "description": "Analyze every section of a resume",
        "parameters": {
            "type": "object",
            "properties": {
                "sections": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "type": {
                                "type": "string",
                                "description": "Section label (Experience, Projects, Education, Skills)"
                            },
                            "points": {
                                "type": "array",
                                "items": {"anyOf": [general_point_schema(), education_point_schema()]}
                            }
                        },
                        "required": ["type", "points"]
                    }
                }
            },
            "required": ["sections"]
        }
    })
}

fn job_match_function() -> Value {
    let percent = json!({"type": "number", "minimum": 0, "maximum": 100});
    json!({
        "name": ResponseShape::JobMatch.function_name(),
        "description": "Analyze how well a resume matches a job description",
        "parameters": {
            "type": "object",
            "properties": {
                "match_score": percent,
                "technical_match": {
                    "type": "object",
                    "properties": {
                        "matched_skills": string_list("Required skills the resume shows"),
                        "missing_skills": string_list("Required skills the resume lacks"),
                        "skill_coverage_score": percent
                    },
                    "required": ["matched_skills", "missing_skills", "skill_coverage_score"]
                },
                "experience_match": {
                    "type": "object",
                    "properties": {
                        "required_years": {"type": "integer", "minimum": 0},
                        "actual_years": {"type": "integer", "minimum": 0},
                        "experience_score": percent
                    },
                    "required": ["required_years", "actual_years", "experience_score"]
                },
                "key_requirements": {
                    "type": "object",
                    "properties": {
                        "met": string_list("Requirements fully met"),
                        "partially_met": string_list("Requirements partially met"),
                        "not_met": string_list("Requirements not met")
                    },
                    "required": ["met", "partially_met", "not_met"]
                },
                "section_recommendations": {
                    "type": "object",
                    "properties": {
                        "experience_projects": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "original_point": {"type": "string"},
                                    "improved_version": {"type": "string"}
                                },
                                "required": ["original_point", "improved_version"]
                            }
                        },
                        "education": {"type": "string"},
                        "skills_certs": {"type": "string"}
                    },
                    "required": ["experience_projects", "education", "skills_certs"]
                },
                "recommendations": string_list("Concrete changes to improve the match")
            },
            "required": [
                "match_score", "technical_match", "experience_match",
                "key_requirements", "recommendations"
            ]
        }
    })
}
