// Prompt constants for the Interview Assistant.

/// Follow-up suggestion prompt. Replace: {jd_text}, {recent_messages}
pub const FOLLOW_UP_PROMPT_TEMPLATE: &str = r#"Based on the job description and the recent conversation, generate one targeted follow-up interview question or discussion point.

Job Description Context:
{jd_text}

Recent Conversation:
{recent_messages}

Provide only the question that is best to ask next for this role. No justification."#;

/// Question list prompt. Replace: {jd_text}, {resume_text}
pub const QUESTIONS_PROMPT_TEMPLATE: &str = r#"Generate a list of 5-7 targeted interview questions based on the following:

JOB DESCRIPTION:
{jd_text}

CANDIDATE RESUME:
{resume_text}

Each question must target a specific skill or experience of the candidate that matters for the role.
Format the output as a numbered list containing only the questions. No justification."#;
