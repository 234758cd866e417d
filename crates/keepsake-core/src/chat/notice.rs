//! Fixed assistant notices appended to the transcript.

/// Shown when the final step is committed without a credential.
pub const LOGIN_REQUIRED: &str = "로그인이 필요합니다. 로그인 후 자동으로 제출됩니다.";

/// Shown when submission succeeds.
pub const SUBMIT_COMPLETE: &str = "제출이 완료되었습니다. 소중한 이야기를 들려주셔서 감사합니다. 여러분의 기억과 추억이 안전하게 보관되었습니다.";

/// Shown when the final step is committed without an attachment.
pub const FILE_MISSING: &str = "파일이 선택되지 않았습니다. 파일을 선택한 뒤 다시 시도해주세요.";

/// Prefix of the user echo produced by committing the file step.
pub const FILE_UPLOADED_PREFIX: &str = "파일을 업로드했습니다: ";

/// Message for a failed submission that the user may retry.
pub fn submit_failed(detail: &str) -> String {
    format!("제출에 실패했습니다. 다시 시도해주세요.\n({})", detail)
}

/// User echo for the committed attachment.
pub fn file_uploaded(file_name: &str) -> String {
    format!("{}{}", FILE_UPLOADED_PREFIX, file_name)
}
