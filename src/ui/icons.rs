pub struct Icons;

impl Icons {
    pub const ROCKET: &str = "🚀";
    pub const CHECK: &str = "✅";
    pub const CROSS: &str = "❌";
    pub const INFO: &str = "ℹ️";
    pub const STATS: &str = "📊";
    pub const EXPORT: &str = "📤";
    pub const TABLE: &str = "📋";
    pub const COLUMN: &str = "🧱";
    pub const EMPTY: &str = "∅";
}
