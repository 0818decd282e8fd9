pub mod providers {

    pub const LOCAL: &str = "local";

    pub const GOOGLE: &str = "google";
}

pub mod roles {

    pub const USER: &str = "user";

    pub const ADMIN: &str = "admin";
}

pub mod subscription_status {

    pub const ACTIVE: &str = "active";

    pub const EXPIRED: &str = "expired";
}

pub mod tickets {

    pub const VERIFICATION: &str = "verification";

    pub const PASSWORD_RESET: &str = "password_reset";

    /// Verification links stay valid for six hours.
    pub const VERIFICATION_TTL_HOURS: i64 = 6;

    /// Password reset links are shorter-lived.
    pub const PASSWORD_RESET_TTL_HOURS: i64 = 1;
}

pub mod tokens {

    pub const ACCESS: &str = "access";

    pub const REFRESH: &str = "refresh";

    pub const ACCESS_TTL_HOURS: i64 = 3;

    pub const REFRESH_TTL_DAYS: i64 = 7;
}

pub mod limits {

    pub const MAX_VARIATIONS_PER_REQUEST: u32 = 10;

    pub const MAX_PROMPT_CHARS: usize = 4000;
}
