fn main() {
    buildsync::cli::start_cli();
}
