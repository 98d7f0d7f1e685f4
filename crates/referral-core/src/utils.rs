//! 通用工具函数

/// 生成影像定位符
///
/// 文件本体由外部存储保管，定位符只需要在集合内唯一。
pub fn generate_image_locator(prefix: &str, extension: &str) -> String {
    format!(
        "/uploads/{}-{}-{}.{}",
        prefix,
        chrono::Utc::now().timestamp_millis(),
        uuid::Uuid::new_v4().simple(),
        extension.trim_start_matches('.')
    )
}

/// 验证影像定位符格式
pub fn is_valid_image_locator(locator: &str) -> bool {
    !locator.trim().is_empty() && !locator.contains("..") && locator.len() <= 512
}
