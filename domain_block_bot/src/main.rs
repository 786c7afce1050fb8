use bot_commons::*;

fn main() {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "WARN,domain_block_bot=debug");
    }
    start_everything(domain_block_bot::entry());
}
