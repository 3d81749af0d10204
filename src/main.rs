fn main() {
    bobble::cli::run();
}
