//! Reply templates shown to students.

pub const WELCOME: &str = "AI家庭教師くんへようこそ！あなたの学びを全力でサポートします。\nまずはいくつかの質問に答えて、あなただけの家庭教師をカスタマイズしましょう！";
pub const ASK_GRADE: &str = "まずはあなたの学年を教えてください！\n\n「小学生」「中学生」「高校生」「大学生」「社会人」の中から選んで返信してくださいね。";
pub const ASK_GENDER: &str = "性別を教えてください。\n\n「男性」「女性」「その他」の中から選んで返信してください。";
pub const ASK_REGION: &str = "お住まいの地域を教えてください。\n例: 東京都、大阪府、北海道";
pub const ASK_WEAK_SUBJECT: &str = "苦手な科目はありますか？複数回答もOKです。\n例: 数学、英語、国語、理科、社会";
pub const ASK_HOW_KNOWN: &str = "AI家庭教師くんをどこで知りましたか？\n例: HP、Instagram、X、TikTok、検索、チラシ、紹介";
pub const ASK_TERMS: &str = "ヒアリングにご協力ありがとうございます！\nAI家庭教師くんの利用には、利用規約への同意が必要です。\n以下のURLから内容をご確認ください。\n[利用規約URLをここに貼る]\n\n内容に同意いただけたら「同意する」と返信してください。";
pub const TERMS_ACCEPTED: &str = "ありがとうございます！利用規約に同意いただきました。\n無料期間がスタートしました！\n本日より5日間、AI家庭教師くんを無料でご利用いただけます。";
pub const REHEARING_COMPLETE: &str = "再設定が完了しました！ありがとう。";
pub const TRIAL_END: &str = "無料期間が終了しました。\n引き続きご利用いただくには、有料プランへのアップグレードが必要です。\n「500円」とメッセージを送信して、アップグレード手続きに進んでください。";
pub const UPGRADE_PROMPT: &str = "無制限プランへのアップグレードはこちらからどうぞ！";
pub const UPGRADE_BUTTON_LABEL: &str = "お申し込みへ進む";
pub const ERROR: &str = "ごめんなさい、エラーが発生しました。もう一度お試しください。";
pub const INVALID_INPUT: &str = "すみません、入力内容が理解できませんでした。正しい形式で入力してくださいね。";
pub const ALREADY_AGREED: &str = "すでに利用規約には同意済みです。ご利用ありがとうございます！";
pub const UNSUPPORTED_MESSAGE: &str = "テキストメッセージか画像を送ってね！";

/// Keyword that restarts the hearing from the first question.
pub const RESET_KEYWORD: &str = "再設定";
/// Keyword that starts a paid-plan checkout.
pub const PAYMENT_KEYWORD: &str = "500円";
/// Reply that accepts the terms of service.
pub const AGREE_KEYWORD: &str = "同意する";
