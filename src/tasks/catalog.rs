// src/tasks/catalog.rs

//! The built-in daily tasks, in execution order.

use std::sync::Arc;
use std::time::Duration;

use crate::device::Selector;
use crate::tasks::add_friend::AddFriendTask;
use crate::tasks::script::{ScriptedTask, Step};
use crate::tasks::TaskDefinition;

/// Text typed into every post the tasks publish.
const POST_CONTENT: &str = ",";

fn scripted(task: ScriptedTask) -> TaskDefinition {
    let name = task.name().to_string();
    let label = task.label().to_string();
    TaskDefinition::new(name, Arc::new(task)).with_label(label)
}

fn fu_li_she() -> ScriptedTask {
    ScriptedTask::new("福利社", "福利社")
        .entry(Selector::text_contains("去QQ会员福利社"))
        .then(Step::pause_secs(2))
        .require(Step::FirstOf(vec![
            Step::click_image("福利社-立即领取.png", 0.8),
            Step::click(Selector::text_contains("立即领取")),
        ]))
        .require(Step::wait_click_image("获取手机号.png", 10))
        .require(Step::wait_click_image("允许.png", 10))
        .require(Step::wait_click_image("单选.png", 10))
        .require(Step::wait_click_image("确认领取.png", 10))
}

fn fa_bu_shuo_shuo() -> ScriptedTask {
    ScriptedTask::new("发布说说", "发布一条空间说说").require(Step::Publish(POST_CONTENT.into()))
}

fn ai_miao_hui() -> ScriptedTask {
    ScriptedTask::new("AI妙绘", "使用AI妙绘")
        .then(Step::pause_secs(5))
        .then(Step::click_within(
            vec![Selector::text_contains("免费使用")],
            Duration::from_secs(10),
        ))
        .then(Step::pause_secs(1))
        .then(Step::AcceptAgreement {
            marker: "AI妙绘用户协议".into(),
            button: "同意并接受".into(),
        })
        .then(Step::pause_secs(2))
        // First style card in the grid.
        .then(Step::TapRatio(0.15, 0.20))
        .require(Step::WaitActiveButton {
            text: "去发布".into(),
            timeout: Duration::from_secs(60),
            interval: Duration::from_secs(5),
        })
        .require(Step::click_within(
            vec![Selector::text("去发布")],
            Duration::from_secs(10),
        ))
        .require(Step::Publish(POST_CONTENT.into()))
}

fn mang_he_qian() -> ScriptedTask {
    ScriptedTask::new("盲盒签", "参与盲盒签并成功发布至空间")
        .require(Step::wait_click_image("保存并发布.png", 30))
        .require(Step::Publish(POST_CONTENT.into()))
}

fn dian_zan_shuo_shuo() -> ScriptedTask {
    ScriptedTask::new("点赞说说", "点赞一条好友动态")
        .then(Step::pause_secs(3))
        .then(Step::LikeImages {
            template: "未点赞.png".into(),
            threshold: 0.9,
            count: 3,
            timeout: Duration::from_secs(30),
        })
}

fn liu_lan_kong_jian() -> ScriptedTask {
    ScriptedTask::new("浏览空间", "浏览十条空间好友动态")
        .then(Step::pause_secs(5))
        .then(Step::SwipeFor {
            duration: Duration::from_secs(20),
            interval: Duration::from_millis(500),
            from: (0.5, 0.8),
            to: (0.5, 0.2),
            stroke: Duration::from_millis(100),
        })
        .then(Step::pause_secs(2))
}

fn deng_lu_nong_chang() -> ScriptedTask {
    ScriptedTask::new("登陆农场", "登录经典农场小游戏")
        .then(Step::pause_secs(20))
        .then(Step::WaitImageGone {
            template: "QQ农场-加载中.png".into(),
            timeout: Duration::from_secs(300),
        })
}

fn ri_qian_da_ka() -> ScriptedTask {
    ScriptedTask::new("日签打卡", "去日签卡打一次卡")
        .then(Step::pause_secs(5))
        .then(Step::FirstOf(vec![
            Step::click_within(vec![Selector::text_contains("立即打卡")], Duration::ZERO),
            Step::click_within(vec![Selector::desc_contains("立即打卡")], Duration::ZERO),
        ]))
        .then(Step::pause_secs(3))
}

fn jin_bi_jia_su() -> ScriptedTask {
    ScriptedTask::new("金币加速", "使用金币兑换等级加速")
        .exact()
        .then(Step::pause_secs(5))
        .require(Step::FirstOf(vec![
            Step::click_image("允许-黑字白底.png", 0.8),
            Step::click_image("允许-蓝字白底.png", 0.8),
        ]))
        .then(Step::RaceImages {
            templates: vec!["跳过.png".into(), "立即兑换.png".into()],
            timeout: Duration::from_secs(20),
        })
}

fn tian_tian_fu_li() -> ScriptedTask {
    ScriptedTask::new("天天福利", "去天天领福利")
        .then(Step::pause_secs(5))
        .then(Step::BrowseFor {
            duration: Duration::from_secs(20),
            template: "立即签到.png".into(),
        })
}

fn mian_fei_xiao_shuo() -> ScriptedTask {
    ScriptedTask::new("免费小说", "去免费小说看任一本书")
        .fallback_label("免费小说")
        .then(Step::pause_secs(5))
        // First book under the "guess you like" header.
        .then(Step::TapBelowImage {
            template: "猜你喜欢.png".into(),
            threshold: 0.7,
            offset: 80,
            fallback: (0.5, 0.6),
        })
}

fn qq_yin_yue() -> ScriptedTask {
    let cycle: [(&str, f32); 8] = [
        ("允许-黑字白底.png", 0.8),
        ("同意！开始听歌.png", 0.6),
        ("进入全功能模式.png", 0.6),
        ("QQ登录.png", 0.8),
        ("单选-白圈黑底.png", 0.8),
        ("QQ登录-黑字蓝底.png", 0.8),
        ("同意.png", 0.8),
        ("打开QQ查看.png", 0.8),
    ];

    ScriptedTask::new("QQ音乐简洁", "去QQ音乐简洁版听歌")
        .exact()
        .then(Step::pause_secs(5))
        .then(Step::click_image("去简洁版听歌领奖励.png", 0.8))
        .then(Step::pause_secs(5))
        .then(Step::click_image("打开.png", 0.8))
        .then(Step::ImageCycle {
            images: cycle.iter().map(|(t, th)| (t.to_string(), *th)).collect(),
            terminal: "打开QQ查看.png".into(),
            max_rounds: 20,
            max_misses: 5,
            settle: Duration::from_secs(10),
        })
}

/// All built-in tasks. `friend_ids` feeds the friend-add task.
pub fn builtin_tasks(friend_ids: Vec<String>) -> Vec<TaskDefinition> {
    vec![
        scripted(fu_li_she()),
        scripted(fa_bu_shuo_shuo()),
        scripted(ai_miao_hui()),
        scripted(mang_he_qian()),
        scripted(dian_zan_shuo_shuo()),
        scripted(liu_lan_kong_jian()),
        scripted(deng_lu_nong_chang()),
        scripted(ri_qian_da_ka()),
        scripted(jin_bi_jia_su()),
        scripted(tian_tian_fu_li()),
        scripted(mian_fei_xiao_shuo()),
        scripted(qq_yin_yue()),
        TaskDefinition::new("添加好友", Arc::new(AddFriendTask::new(friend_ids))).with_refresh_before(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_match_surface_rows() {
        let tasks = builtin_tasks(Vec::new());
        let label = |name: &str| {
            tasks
                .iter()
                .find(|t| t.name == name)
                .and_then(|t| t.label.clone())
        };
        assert_eq!(label("福利社").as_deref(), Some("福利社"));
        assert_eq!(label("浏览空间").as_deref(), Some("浏览十条空间好友动态"));
        assert_eq!(label("金币加速").as_deref(), Some("使用金币兑换等级加速"));
        assert_eq!(label("添加好友"), None);
    }

    #[test]
    fn names_are_unique() {
        let tasks = builtin_tasks(Vec::new());
        let mut names: Vec<_> = tasks.iter().map(|t| t.name.clone()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), tasks.len());
    }
}
