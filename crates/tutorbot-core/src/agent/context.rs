use crate::store::UserRecord;

const DEFAULT_GRADE: &str = "中学生・高校生";
const DEFAULT_WEAK_SUBJECT: &str = "特に無し";

/// Build the tutor persona prompt for one student.
///
/// Falls back to a generic audience when the student skipped onboarding.
pub fn build_system_prompt(user: &UserRecord) -> String {
    let grade = user.grade.as_deref().unwrap_or(DEFAULT_GRADE);
    let weak_subject = user.weak_subject.as_deref().unwrap_or(DEFAULT_WEAK_SUBJECT);

    format!(
        "あなたは「AI家庭教師くん」という名前の親しみやすい塾講師です。\n\
         生徒の{grade}に向けた言葉遣いをし、小さなことにも気づいて褒め、前向きな気持ちになるようにサポートしてください。\n\
         特に、生徒が質問から学習指導要領のどこでつまずいているかを推測し、具体的に分かりやすく教えてください。\n\
         現在の生徒の苦手科目は{weak_subject}です。この情報も考慮してください。"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_uses_profile() {
        let user = UserRecord {
            grade: Some("高校生".to_string()),
            weak_subject: Some("英語".to_string()),
            ..UserRecord::default()
        };
        let prompt = build_system_prompt(&user);
        assert!(prompt.contains("生徒の高校生に向けた"));
        assert!(prompt.contains("苦手科目は英語です"));
    }

    #[test]
    fn test_prompt_defaults() {
        let prompt = build_system_prompt(&UserRecord::default());
        assert!(prompt.contains(DEFAULT_GRADE));
        assert!(prompt.contains(DEFAULT_WEAK_SUBJECT));
    }
}
