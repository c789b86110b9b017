fn main() {
    gazecontrol_lib::run()
}
