//! Outbound message templates and formatting helpers.

use super::traits::UserId;

pub const HELP: &str = "\
Commands:\n\
/events - show upcoming events\n\
/update - refresh events and update the pinned announcement\n\
/createevent <url> - add an event from a supported site\n\
/set - start the periodic announcement update (admin)\n\
/unset - stop the periodic announcement update (admin)\n\
/guestlist @handle - wave a newcomer through (admin)\n\
/kick @handle - remove a member (admin)\n\
/help - this message";

pub const ADMIN_ACCESS_DENIED: &str = "Sorry, only the group administrator can do that.";

pub const USER_NOT_FOUND: &str =
    "I don't know that user. They may have joined before I started keeping track.";

pub const NO_EVENT_URL: &str = "Please include a link to the event you want to add.";

pub const UNSUPPORTED_EVENT_URL: &str = "I don't know how to import events from that site.";

pub const EVENT_CREATED: &str = "Event added to the calendar!";

pub const EVENT_CREATION_FAILED: &str = "Something went wrong while adding that event.";

pub const UPCOMING_EVENTS_HEADER: &str = "<b>Upcoming events this week</b>\n\n";

pub const NO_UPCOMING_EVENTS: &str = "Nothing on the calendar yet. Check back soon!";

pub fn welcome(mention: &str) -> String {
    format!(
        "Welcome {mention}! Tell us a bit about yourself in a message \
         containing #whois, or I'll have to assume you're a lurker bot."
    )
}

pub fn identified(mention: &str) -> String {
    format!("Thanks {mention}, you're all set. Enjoy!")
}

pub fn idle_warning(mention: &str) -> String {
    format!(
        "Hey {mention}, you still haven't introduced yourself. \
         Say something with #whois soon or I'll have to remove you."
    )
}

pub fn kicked(mention: &str) -> String {
    format!(
        "{mention} never introduced themselves and was removed. \
         They're welcome to rejoin and try again."
    )
}

pub fn guest_listed(mention: &str) -> String {
    format!("{mention} is on the guest list, no introduction needed.")
}

pub fn nothing_pending(handle: &str) -> String {
    format!("{handle} has no pending introduction.")
}

/// HTML mention that links a display name to a user id.
pub fn mention(user: UserId, name: &str) -> String {
    format!("<a href='tg://user?id={}'>{}</a>", user.0, name)
}

/// Join first and optional last name the way the platform displays them.
pub fn display_name(first_name: &str, last_name: Option<&str>) -> String {
    match last_name {
        Some(last) => format!("{first_name} {last}"),
        None => first_name.to_string(),
    }
}
