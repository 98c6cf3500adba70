pub mod attachments;
pub mod login;
pub mod logout;
pub mod opportunities;
pub mod sync;
pub mod whoami;
