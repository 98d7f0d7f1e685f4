//! 患者状态转换表
//!
//! 显式枚举合法的(from, to)状态对，来源里"任意状态可设为任意状态"的
//! 宽松行为在这里收紧为守卫的状态机。

use referral_core::{PatientStatus, ReferralError, Result};
use std::collections::HashSet;

/// 患者状态转换表
///
/// `diagnosed` 不在表里：它只能通过诊断创建进入。
#[derive(Debug)]
pub struct StatusTransitions {
    transitions: HashSet<(PatientStatus, PatientStatus)>,
}

impl StatusTransitions {
    /// 创建新的转换表实例
    pub fn new() -> Self {
        let mut transitions = HashSet::new();

        // 定义状态转换规则（由分配医生触发）
        transitions.insert((PatientStatus::Pending, PatientStatus::UnderReview));
        transitions.insert((PatientStatus::UnderReview, PatientStatus::FollowUpRequired));
        transitions.insert((PatientStatus::FollowUpRequired, PatientStatus::UnderReview));
        transitions.insert((PatientStatus::Diagnosed, PatientStatus::FollowUpRequired));

        Self { transitions }
    }

    /// 检查状态转换是否合法
    pub fn can_transition(&self, from: PatientStatus, to: PatientStatus) -> bool {
        self.transitions.contains(&(from, to))
    }

    /// 校验状态转换，非法时返回错误
    ///
    /// 诊断引用在 diagnosed 及其后续状态下保持设置，已诊断的记录
    /// 不允许回到 under_review，否则引用会指向一条"审查中"的记录。
    pub fn check(&self, from: PatientStatus, to: PatientStatus, has_diagnosis: bool) -> Result<()> {
        let allowed = self.can_transition(from, to)
            && !(has_diagnosis && to == PatientStatus::UnderReview);
        if allowed {
            Ok(())
        } else {
            Err(ReferralError::InvalidStateTransition {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            })
        }
    }

    /// 某个状态下是否允许创建诊断
    ///
    /// 诊断可以从任何未诊断状态发起；是否已有诊断由诊断引用守卫。
    pub fn can_diagnose(&self, from: PatientStatus) -> bool {
        from != PatientStatus::Diagnosed
    }

    /// 获取某个状态的所有合法目标状态
    pub fn allowed_targets(&self, from: PatientStatus) -> Vec<PatientStatus> {
        self.transitions
            .iter()
            .filter(|(f, _)| *f == from)
            .map(|(_, to)| *to)
            .collect()
    }
}

impl Default for StatusTransitions {
    fn default() -> Self {
        Self::new()
    }
}
