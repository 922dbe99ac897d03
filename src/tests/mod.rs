mod test_six_dof_arm;
