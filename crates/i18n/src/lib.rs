use std::collections::BTreeMap;

use core_types::UiLanguage;

#[derive(Debug, Clone)]
pub struct I18n {
    lang: UiLanguage,
    zh_cn: BTreeMap<&'static str, &'static str>,
    en_us: BTreeMap<&'static str, &'static str>,
}

impl I18n {
    pub fn new(lang: UiLanguage) -> Self {
        Self {
            lang,
            zh_cn: zh_cn_map(),
            en_us: en_us_map(),
        }
    }

    pub fn t<'a>(&'a self, key: &'a str) -> &'a str {
        match self.lang {
            UiLanguage::ZhCn => self
                .zh_cn
                .get(key)
                .copied()
                .or_else(|| self.en_us.get(key).copied())
                .unwrap_or(key),
            UiLanguage::EnUs => self
                .en_us
                .get(key)
                .copied()
                .or_else(|| self.zh_cn.get(key).copied())
                .unwrap_or(key),
        }
    }
}

impl Default for I18n {
    fn default() -> Self {
        Self::new(UiLanguage::EnUs)
    }
}

fn zh_cn_map() -> BTreeMap<&'static str, &'static str> {
    BTreeMap::from([
        ("error.fetch_notes", "获取笔记失败，请重试。"),
        ("error.fetch_note", "获取笔记详情失败，请重试。"),
        ("error.create_note", "创建笔记失败，请重试。"),
        ("error.update_note", "更新笔记失败，请重试。"),
        ("error.archive_note", "归档笔记失败，请重试。"),
        ("error.restore_note", "恢复笔记失败，请重试。"),
        ("error.delete_note", "删除笔记失败，请重试。"),
        ("error.search_notes", "搜索笔记失败，请重试。"),
        ("error.similar_notes", "获取相似笔记失败，请重试。"),
        ("error.fetch_tags", "获取标签失败，请重试。"),
        ("error.merge_notes", "合并笔记失败，请重试。"),
        ("error.fetch_revisions", "获取修订历史失败，请重试。"),
        ("error.fetch_diff", "获取修订差异失败，请重试。"),
        ("error.revert", "回滚到该修订失败，请重试。"),
        ("error.not_found", "笔记不存在。"),
        ("validation.title_required", "标题不能为空。"),
        ("validation.content_required", "内容不能为空。"),
        ("validation.merge_min_notes", "请至少选择两条笔记进行合并。"),
        ("validation.merge_duplicate", "同一条笔记不能重复合并。"),
        ("validation.merge_title_required", "合并后的笔记需要标题。"),
        ("notice.note_created", "笔记已创建"),
        ("notice.note_updated", "笔记已更新"),
        ("notice.note_archived", "笔记已归档"),
        ("notice.note_restored", "笔记已恢复"),
        ("notice.note_deleted", "笔记已永久删除"),
        ("notice.notes_merged", "笔记已合并"),
        ("notice.note_reverted", "已回滚到所选修订"),
    ])
}

fn en_us_map() -> BTreeMap<&'static str, &'static str> {
    BTreeMap::from([
        ("error.fetch_notes", "Error fetching notes. Please try again."),
        ("error.fetch_note", "Error fetching note. Please try again."),
        ("error.create_note", "Error creating note. Please try again."),
        ("error.update_note", "Error updating note. Please try again."),
        ("error.archive_note", "Error archiving note. Please try again."),
        ("error.restore_note", "Error restoring note. Please try again."),
        ("error.delete_note", "Error deleting note. Please try again."),
        ("error.search_notes", "Error searching notes. Please try again."),
        (
            "error.similar_notes",
            "Error fetching similar notes. Please try again.",
        ),
        ("error.fetch_tags", "Error fetching tags. Please try again."),
        ("error.merge_notes", "Error merging notes. Please try again."),
        (
            "error.fetch_revisions",
            "Error fetching revisions. Please try again.",
        ),
        ("error.fetch_diff", "Error fetching revision diff. Please try again."),
        ("error.revert", "Error reverting to revision. Please try again."),
        ("error.not_found", "Note not found."),
        ("validation.title_required", "Title is required."),
        ("validation.content_required", "Content is required."),
        (
            "validation.merge_min_notes",
            "Select at least two notes to merge.",
        ),
        (
            "validation.merge_duplicate",
            "A note can only be merged once.",
        ),
        (
            "validation.merge_title_required",
            "The merged note needs a title.",
        ),
        ("notice.note_created", "Note created"),
        ("notice.note_updated", "Note updated"),
        ("notice.note_archived", "Note archived"),
        ("notice.note_restored", "Note restored"),
        ("notice.note_deleted", "Note deleted permanently"),
        ("notice.notes_merged", "Notes merged"),
        ("notice.note_reverted", "Reverted to revision"),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_chinese_translation() {
        let i18n = I18n::new(UiLanguage::ZhCn);
        assert_eq!(i18n.t("notice.note_archived"), "笔记已归档");
    }

    #[test]
    fn catalogues_share_keys() {
        let zh = zh_cn_map();
        let en = en_us_map();
        assert!(zh.keys().eq(en.keys()));
    }

    #[test]
    fn falls_back_to_key_when_missing() {
        let i18n = I18n::new(UiLanguage::EnUs);
        assert_eq!(i18n.t("not.exists"), "not.exists");
    }
}
