//! Help cards.

use crate::gateway::Embed;

pub fn general() -> Embed {
    Embed::new("Point economy help")
        .field(
            "💡 Earning points",
            "Voice channels pay automatically:\n\
             mic on: 2 points per minute\n\
             mic off: 1 point per minute",
        )
        .field("📅 `!checkin`", "Daily check-in reward. `!checkin-status` shows your progress")
        .field("💰 `!points`", "Your points, XP and level")
        .field("🏆 `!leaderboard`", "Top 10 by points")
        .field("📊 `!average`", "Member count, total and average points")
        .field("🙏 `!beg`", "Ask for spare points, 5 times a day")
        .field("🎲 `!gamble <points>`", "Try to multiply your bet")
        .field("🎰 `!slot`", "Spin for the progressive jackpot")
        .field("📤 `!send @user <points>`", "Give points to another member")
        .field("🛠️ `!grant @user <points>`", "(admin) Award points")
        .field("🛒 `!market`", "See `!market help`")
        .field("🎮 Mini-games", "See `!minigames`")
}

pub fn market() -> Embed {
    Embed::new("🌞 Marketplace help")
        .description("Buy and sell services with points.")
        .field(
            "🛒 Register",
            "`!market register (name) <price>`\ne.g. `!market register (Thumbnail design) 30`",
        )
        .field("📦 Manage", "`!market manage`\n`!market manage (name) delete`")
        .field("🛍️ Browse", "`!market browse`")
        .field("🎯 Buy", "`!market buy @seller (name)`")
        .field("⚠️ Notes", "Names go inside `( )`. Only buying needs a mention.")
}

pub fn minigames() -> Embed {
    Embed::new("🎮 Mini-games")
        .field(
            "🏇 Horse race",
            "`!race enter <horse> <horse>...` then `!bet <number> <points>`, \
             `!race start`, `!race cancel`",
        )
        .field("✊ Rock-paper-scissors", "`!rps rock|paper|scissors [points]` against the bot")
        .field("✂️ Duel", "`!duel @user`: the winner takes both stakes")
        .field("⚡ Reaction battle", "`!react [points]`: the fastest player takes the pot")
        .field("🎯 Number guess", "`!guess`: guess 1 to 10 for 50 points")
        .field("🎲 Dice", "`!dice`: beat the bot's roll for 30 points")
}
