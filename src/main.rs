fn main() {
    rc_lab_plot::cli::run();
}
